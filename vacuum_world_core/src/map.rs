use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::geometry::Coord;

/// A generic square grid.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Any coordinate outside `[0, size) x [0, size)` simply does not exist in the
/// grid: lookups return `None` rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new `size` x `size` grid filled by a generator function.
    ///
    /// The generator takes the coordinate of the cell being built.
    ///
    /// # Panics
    ///
    /// Panics if `size * size` overflows `usize` or `size` does not fit in `i32`.
    pub fn from_generator<F>(size: usize, mut f: F) -> Self
    where
        F: FnMut(Coord) -> T,
    {
        let side = i32::try_from(size).expect("Grid size exceeds i32");
        let len = size.checked_mul(size).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(len);
        for y in 0..side {
            for x in 0..side {
                cells.push(f(Coord::new(x, y)));
            }
        }
        Grid { size, cells }
    }

    /// Returns the side length of the grid.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Converts a coordinate to a flat vector index.
    ///
    /// Returns `None` if the coordinate is out of bounds.
    #[inline]
    pub fn coord_to_index(&self, coord: Coord) -> Option<usize> {
        if self.contains(coord) {
            Some(coord.y as usize * self.size + coord.x as usize)
        } else {
            None
        }
    }

    /// Converts a flat vector index back to a coordinate.
    #[inline]
    pub fn index_to_coord(&self, index: usize) -> Option<Coord> {
        if index < self.cells.len() {
            Some(Coord::new(
                (index % self.size) as i32,
                (index / self.size) as i32,
            ))
        } else {
            None
        }
    }

    /// Checks if the coordinate lies within the grid.
    #[inline]
    pub fn contains(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.size
            && (coord.y as usize) < self.size
    }

    pub fn get(&self, coord: Coord) -> Option<&T> {
        let index = self.coord_to_index(coord)?;
        self.cells.get(index)
    }

    pub fn get_mut(&mut self, coord: Coord) -> Option<&mut T> {
        let index = self.coord_to_index(coord)?;
        self.cells.get_mut(index)
    }

    /// Returns an iterator over the cells of the grid in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Returns an iterator that yields `(coord, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Coord, &T)> {
        let size = self.size;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (
                Coord::new((index % size) as i32, (index / size) as i32),
                cell,
            )
        })
    }
}

impl<T> Index<Coord> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, coord: Coord) -> &Self::Output {
        match self.coord_to_index(coord) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for grid size {}",
                coord, self.size
            ),
        }
    }
}

impl<T> IndexMut<Coord> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, coord: Coord) -> &mut Self::Output {
        let size = self.size;
        match self.coord_to_index(coord) {
            Some(idx) => &mut self.cells[idx],
            None => panic!("Grid index {} out of bounds for grid size {}", coord, size),
        }
    }
}

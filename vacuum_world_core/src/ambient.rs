use std::collections::BTreeMap;

use crate::{
    EntityId,
    geometry::{Coord, Direction},
    location::{ActorAppearance, DirtAppearance, Location, Walls},
    map::Grid,
};

/// Errors raised when populating or editing the world from outside the
/// action pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinate {coord} is out of bounds for grid size {size}")]
    OutOfBounds { coord: Coord, size: usize },
    #[error("Coordinate {0} is already occupied by an actor")]
    ActorPresent(Coord),
    #[error("Coordinate {0} already contains dirt")]
    DirtPresent(Coord),
    #[error("Coordinate {0} contains no dirt")]
    NoDirt(Coord),
    #[error("Actor {0} is already in the grid")]
    DuplicateActor(EntityId),
    #[error("Actor {0} is not in the grid")]
    UnknownActor(EntityId),
}

/// The world state: every cell of the grid and what it holds.
///
/// This is the only structure allowed to change occupancy. The mutating
/// primitives (`move_actor`, `turn_actor`, `drop_dirt`, `remove_dirt`) assert
/// their preconditions and panic when they are violated: callers are expected
/// to have checked them first, so a violation is a bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambient {
    grid: Grid<Location>,
    actor_index: BTreeMap<EntityId, Coord>,
}

impl Ambient {
    /// Creates an empty `size` x `size` world.
    pub fn new(size: usize) -> Self {
        Ambient {
            grid: Grid::from_generator(size, |coord| Location::new(coord, Walls::for_cell(coord, size))),
            actor_index: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.grid.size()
    }

    pub fn contains(&self, coord: Coord) -> bool {
        self.grid.contains(coord)
    }

    /// Returns the cell at `coord`, or `None` when it is out of bounds.
    pub fn get(&self, coord: Coord) -> Option<&Location> {
        self.grid.get(coord)
    }

    /// Returns the cell at `coord`.
    ///
    /// # Panics
    ///
    /// Panics if `coord` is out of bounds.
    pub fn location_at(&self, coord: Coord) -> &Location {
        &self.grid[coord]
    }

    pub fn is_actor_at(&self, coord: Coord) -> bool {
        self.location_at(coord).has_actor()
    }

    pub fn is_dirt_at(&self, coord: Coord) -> bool {
        self.location_at(coord).has_dirt()
    }

    /// Relocates the actor standing on `from` to `to`.
    pub fn move_actor(&mut self, from: Coord, to: Coord) {
        assert!(self.is_actor_at(from), "no actor to move at {from}");
        assert!(!self.is_actor_at(to), "cannot move onto occupied cell {to}");

        let actor = self.grid[from]
            .take_actor()
            .expect("actor presence asserted above");
        self.actor_index.insert(actor.id(), to);
        self.grid[to].put_actor(actor);
    }

    /// Rotates the actor standing on `coord`.
    pub fn turn_actor(&mut self, coord: Coord, direction: Direction) {
        let actor = self.grid[coord]
            .actor_mut()
            .unwrap_or_else(|| panic!("no actor to turn at {coord}"));
        actor.turn(direction);
    }

    pub fn drop_dirt(&mut self, coord: Coord, dirt: DirtAppearance) {
        assert!(!self.is_dirt_at(coord), "cell {coord} already holds dirt");
        self.grid[coord].put_dirt(dirt);
    }

    pub fn remove_dirt(&mut self, coord: Coord) -> DirtAppearance {
        self.grid[coord]
            .take_dirt()
            .unwrap_or_else(|| panic!("no dirt to remove at {coord}"))
    }

    /// Where actor `id` currently stands.
    pub fn actor_coord(&self, id: EntityId) -> Option<Coord> {
        self.actor_index.get(&id).copied()
    }

    pub fn actor(&self, id: EntityId) -> Option<&ActorAppearance> {
        let coord = self.actor_coord(id)?;
        self.location_at(coord).actor()
    }

    /// Ids of every actor in the grid, ascending.
    pub fn actor_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.actor_index.keys().copied()
    }

    /// Places a new actor on an empty cell.
    pub fn place_actor(&mut self, coord: Coord, actor: ActorAppearance) -> Result<(), GridError> {
        self.check_bounds(coord)?;
        if self.actor_index.contains_key(&actor.id()) {
            return Err(GridError::DuplicateActor(actor.id()));
        }
        if self.is_actor_at(coord) {
            return Err(GridError::ActorPresent(coord));
        }
        self.actor_index.insert(actor.id(), coord);
        self.grid[coord].put_actor(actor);
        Ok(())
    }

    /// Takes actor `id` out of the grid.
    pub fn take_actor(&mut self, id: EntityId) -> Result<ActorAppearance, GridError> {
        let coord = self
            .actor_index
            .remove(&id)
            .ok_or(GridError::UnknownActor(id))?;
        let actor = self.grid[coord]
            .take_actor()
            .unwrap_or_else(|| panic!("actor index points at empty cell {coord} for actor {id}"));
        assert_eq!(actor.id(), id, "actor index out of sync at {coord}");
        Ok(actor)
    }

    /// Places dirt on a cell that has none.
    pub fn place_dirt(&mut self, coord: Coord, dirt: DirtAppearance) -> Result<(), GridError> {
        self.check_bounds(coord)?;
        if self.is_dirt_at(coord) {
            return Err(GridError::DirtPresent(coord));
        }
        self.drop_dirt(coord, dirt);
        Ok(())
    }

    /// Clears dirt from a cell that has some.
    pub fn clear_dirt(&mut self, coord: Coord) -> Result<DirtAppearance, GridError> {
        self.check_bounds(coord)?;
        if !self.is_dirt_at(coord) {
            return Err(GridError::NoDirt(coord));
        }
        Ok(self.remove_dirt(coord))
    }

    /// Every cell, in row-major order.
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.grid.iter()
    }

    /// Every dirt item with its coordinate, in row-major order.
    pub fn dirts(&self) -> impl Iterator<Item = (Coord, &DirtAppearance)> {
        self.grid
            .enumerate()
            .filter_map(|(coord, location)| location.dirt().map(|dirt| (coord, dirt)))
    }

    fn check_bounds(&self, coord: Coord) -> Result<(), GridError> {
        if self.contains(coord) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                coord,
                size: self.size(),
            })
        }
    }
}

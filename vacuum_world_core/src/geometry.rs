use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::action::ActionError;

/// Represents a 2D coordinate.
///
/// Coordinates carry no bounds of their own; whether a coordinate exists is a
/// question for the [`Ambient`](crate::ambient::Ambient) that holds the grid.
/// `y` grows southward, so north of `(0, 0)` is `(0, -1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }

    /// Returns the coordinate shifted by `(dx, dy)`.
    #[inline]
    pub const fn translate(self, dx: i32, dy: i32) -> Self {
        Coord {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    #[inline]
    fn step(self, orientation: Orientation) -> Self {
        let (dx, dy) = orientation.unit();
        self.translate(dx, dy)
    }

    /// The cell one step ahead when facing `orientation`.
    pub fn forward(self, orientation: Orientation) -> Self {
        self.step(orientation)
    }

    /// The cell one step behind when facing `orientation`.
    pub fn backward(self, orientation: Orientation) -> Self {
        self.step(orientation.opposite())
    }

    /// The cell to the left of an observer facing `orientation`.
    pub fn left(self, orientation: Orientation) -> Self {
        self.step(orientation.left())
    }

    /// The cell to the right of an observer facing `orientation`.
    pub fn right(self, orientation: Orientation) -> Self {
        self.step(orientation.right())
    }

    /// The diagonal cell ahead and to the left.
    pub fn forward_left(self, orientation: Orientation) -> Self {
        self.forward(orientation).left(orientation)
    }

    /// The diagonal cell ahead and to the right.
    pub fn forward_right(self, orientation: Orientation) -> Self {
        self.forward(orientation).right(orientation)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal directions an actor can face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    North,
    South,
    East,
    West,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::North,
        Orientation::East,
        Orientation::South,
        Orientation::West,
    ];

    /// Unit vector of this orientation.
    pub const fn unit(self) -> (i32, i32) {
        match self {
            Orientation::North => (0, -1),
            Orientation::South => (0, 1),
            Orientation::East => (1, 0),
            Orientation::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Orientation::North => Orientation::South,
            Orientation::South => Orientation::North,
            Orientation::East => Orientation::West,
            Orientation::West => Orientation::East,
        }
    }

    /// Orientation after a quarter turn counter-clockwise.
    pub const fn left(self) -> Self {
        match self {
            Orientation::North => Orientation::West,
            Orientation::West => Orientation::South,
            Orientation::South => Orientation::East,
            Orientation::East => Orientation::North,
        }
    }

    /// Orientation after a quarter turn clockwise.
    pub const fn right(self) -> Self {
        match self {
            Orientation::North => Orientation::East,
            Orientation::East => Orientation::South,
            Orientation::South => Orientation::West,
            Orientation::West => Orientation::North,
        }
    }

    pub const fn rotate(self, direction: Direction) -> Self {
        match direction {
            Direction::Left => self.left(),
            Direction::Right => self.right(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Orientation::North => "north",
            Orientation::South => "south",
            Orientation::East => "east",
            Orientation::West => "west",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Orientation::North),
            "south" => Ok(Orientation::South),
            "east" => Ok(Orientation::East),
            "west" => Ok(Orientation::West),
            _ => Err(ActionError::InvalidOrientation(s.to_string())),
        }
    }
}

/// Which way a turn goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(ActionError::InvalidDirection(s.to_string())),
        }
    }
}

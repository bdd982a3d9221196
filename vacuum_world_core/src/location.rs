use serde::{Deserialize, Serialize};

use crate::{
    Colour, DirtColour, EntityId,
    geometry::{Coord, Direction, Orientation},
};

/// What other actors can see of an actor.
///
/// The colour never changes after creation, and the orientation only changes
/// through [`ActorAppearance::turn`], which also remembers the orientation held
/// before the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorAppearance {
    id: EntityId,
    colour: Colour,
    orientation: Orientation,
    previous_orientation: Orientation,
}

impl ActorAppearance {
    pub fn new(id: EntityId, colour: Colour, orientation: Orientation) -> Self {
        Self {
            id,
            colour,
            orientation,
            previous_orientation: orientation,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn colour(&self) -> Colour {
        self.colour
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Orientation held immediately before the most recent turn.
    pub fn previous_orientation(&self) -> Orientation {
        self.previous_orientation
    }

    pub(crate) fn turn(&mut self, direction: Direction) {
        self.previous_orientation = self.orientation;
        self.orientation = self.orientation.rotate(direction);
    }
}

/// A dirt item lying on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtAppearance {
    id: EntityId,
    colour: DirtColour,
}

impl DirtAppearance {
    pub fn new(id: EntityId, colour: DirtColour) -> Self {
        Self { id, colour }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn colour(&self) -> DirtColour {
        self.colour
    }
}

/// Which sides of a cell border the edge of the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Walls {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl Walls {
    /// Wall layout of `coord` in a grid of side `size`.
    pub fn for_cell(coord: Coord, size: usize) -> Self {
        let last = size as i32 - 1;
        Walls {
            north: coord.y == 0,
            south: coord.y == last,
            east: coord.x == last,
            west: coord.x == 0,
        }
    }

    /// Whether the side facing `orientation` is a wall.
    pub fn on(&self, orientation: Orientation) -> bool {
        match orientation {
            Orientation::North => self.north,
            Orientation::South => self.south,
            Orientation::East => self.east,
            Orientation::West => self.west,
        }
    }
}

/// The contents of one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    coord: Coord,
    actor: Option<ActorAppearance>,
    dirt: Option<DirtAppearance>,
    walls: Walls,
}

impl Location {
    pub fn new(coord: Coord, walls: Walls) -> Self {
        Self {
            coord,
            actor: None,
            dirt: None,
            walls,
        }
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    pub fn actor(&self) -> Option<&ActorAppearance> {
        self.actor.as_ref()
    }

    pub fn dirt(&self) -> Option<&DirtAppearance> {
        self.dirt.as_ref()
    }

    pub fn walls(&self) -> Walls {
        self.walls
    }

    pub fn has_actor(&self) -> bool {
        self.actor.is_some()
    }

    pub fn has_dirt(&self) -> bool {
        self.dirt.is_some()
    }

    pub(crate) fn actor_mut(&mut self) -> Option<&mut ActorAppearance> {
        self.actor.as_mut()
    }

    pub(crate) fn put_actor(&mut self, actor: ActorAppearance) {
        self.actor = Some(actor);
    }

    pub(crate) fn take_actor(&mut self) -> Option<ActorAppearance> {
        self.actor.take()
    }

    pub(crate) fn put_dirt(&mut self, dirt: DirtAppearance) {
        self.dirt = Some(dirt);
    }

    pub(crate) fn take_dirt(&mut self) -> Option<DirtAppearance> {
        self.dirt.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turning_records_previous_orientation() {
        let mut actor = ActorAppearance::new(1, Colour::Green, Orientation::North);
        assert_eq!(actor.previous_orientation(), Orientation::North);
        actor.turn(Direction::Right);
        assert_eq!(actor.orientation(), Orientation::East);
        assert_eq!(actor.previous_orientation(), Orientation::North);
        actor.turn(Direction::Right);
        assert_eq!(actor.orientation(), Orientation::South);
        assert_eq!(actor.previous_orientation(), Orientation::East);
    }

    #[test]
    fn corner_cells_have_two_walls() {
        let walls = Walls::for_cell(Coord::new(0, 0), 4);
        assert!(walls.north && walls.west);
        assert!(!walls.south && !walls.east);

        let walls = Walls::for_cell(Coord::new(3, 3), 4);
        assert!(walls.on(Orientation::South) && walls.on(Orientation::East));

        let inner = Walls::for_cell(Coord::new(1, 2), 4);
        assert_eq!(inner, Walls::default());
    }
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod action;
pub mod ambient;
pub mod config;
pub mod environment;
pub mod executor;
pub mod geometry;
pub mod location;
pub mod map;
pub mod message;
pub mod mind;
pub mod observation;
pub mod snapshot;

use crate::action::ActionError;

/// Unique identifier for entities (actors and dirt).
pub type EntityId = usize;

/// Hands out progressive entity ids.
///
/// Owned by whoever builds the world (normally the
/// [`Environment`](environment::Environment)); there is no process-wide counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGenerator {
    next: EntityId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh id and advances the counter.
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Makes sure ids handed out from now on are strictly greater than `id`.
    pub fn skip_past(&mut self, id: EntityId) {
        self.next = self.next.max(id + 1);
    }
}

/// The colour of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    Green,
    Orange,
    White,
    User,
}

impl Colour {
    pub const ALL: [Colour; 4] = [Colour::Green, Colour::Orange, Colour::White, Colour::User];

    pub const fn as_str(self) -> &'static str {
        match self {
            Colour::Green => "green",
            Colour::Orange => "orange",
            Colour::White => "white",
            Colour::User => "user",
        }
    }

    /// Whether an actor of this colour may clean dirt of `dirt` colour.
    pub fn can_clean(self, dirt: DirtColour) -> bool {
        match self {
            Colour::White => true,
            Colour::User => false,
            Colour::Green => dirt == DirtColour::Green,
            Colour::Orange => dirt == DirtColour::Orange,
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Colour {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Colour::Green),
            "orange" => Ok(Colour::Orange),
            "white" => Ok(Colour::White),
            "user" => Ok(Colour::User),
            _ => Err(ActionError::InvalidColour(s.to_string())),
        }
    }
}

/// The colour of a dirt item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtColour {
    Green,
    Orange,
}

impl DirtColour {
    pub const ALL: [DirtColour; 2] = [DirtColour::Green, DirtColour::Orange];

    pub const fn as_str(self) -> &'static str {
        match self {
            DirtColour::Green => "green",
            DirtColour::Orange => "orange",
        }
    }
}

impl fmt::Display for DirtColour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DirtColour {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(DirtColour::Green),
            "orange" => Ok(DirtColour::Orange),
            _ => Err(ActionError::InvalidDirtColour(s.to_string())),
        }
    }
}

pub use action::{Action, ActionKind, ActionOutcome, EffortTable};
pub use ambient::{Ambient, GridError};
pub use config::SimulationConfig;
pub use environment::{CycleError, Environment, StopSignal, TickReport};
pub use geometry::{Coord, Direction, Orientation};
pub use location::{ActorAppearance, DirtAppearance, Location, Walls};
pub use mind::{Decision, Mind};
pub use observation::{Observation, RelativePosition};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_generator_is_monotonic() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        ids.skip_past(10);
        assert_eq!(ids.next_id(), 11);
        ids.skip_past(3);
        assert_eq!(ids.next_id(), 12);
    }

    #[test]
    fn cleaning_permissions_follow_colour() {
        assert!(Colour::White.can_clean(DirtColour::Green));
        assert!(Colour::White.can_clean(DirtColour::Orange));
        assert!(Colour::Green.can_clean(DirtColour::Green));
        assert!(!Colour::Green.can_clean(DirtColour::Orange));
        assert!(Colour::Orange.can_clean(DirtColour::Orange));
        assert!(!Colour::User.can_clean(DirtColour::Green));
        assert!(!Colour::User.can_clean(DirtColour::Orange));
    }

    #[test]
    fn dirt_colour_rejects_actor_only_colours() {
        assert_eq!("orange".parse::<DirtColour>(), Ok(DirtColour::Orange));
        assert_eq!(
            "white".parse::<DirtColour>(),
            Err(ActionError::InvalidDirtColour("white".to_string()))
        );
        assert_eq!("User".parse::<Colour>(), Ok(Colour::User));
    }
}

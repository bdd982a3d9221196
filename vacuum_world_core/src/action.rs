use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{DirtColour, EntityId, geometry::Direction};

/// Errors raised while building an action from loose input.
///
/// These never reach an executor: a malformed action is rejected where it is
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("'{0}' is not a turn direction (expected left or right)")]
    InvalidDirection(String),
    #[error("'{0}' is not a dirt colour (expected green or orange)")]
    InvalidDirtColour(String),
    #[error("'{0}' is not an actor colour")]
    InvalidColour(String),
    #[error("'{0}' is not an orientation")]
    InvalidOrientation(String),
    #[error("'{0}' is not an action kind")]
    UnknownKind(String),
}

/// Represents actions an actor can decide to take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Action {
    Move,
    Turn {
        direction: Direction,
    },
    Clean,
    Drop {
        colour: DirtColour,
    },
    Speak {
        message: String,
        recipients: Vec<EntityId>,
        sender: EntityId,
    },
    Broadcast {
        message: String,
        sender: EntityId,
    },
    Idle,
}

impl Action {
    pub fn turn(direction: Direction) -> Self {
        Action::Turn { direction }
    }

    pub fn drop_dirt(colour: DirtColour) -> Self {
        Action::Drop { colour }
    }

    pub fn speak(message: impl Into<String>, recipients: Vec<EntityId>, sender: EntityId) -> Self {
        Action::Speak {
            message: message.into(),
            recipients,
            sender,
        }
    }

    pub fn broadcast(message: impl Into<String>, sender: EntityId) -> Self {
        Action::Broadcast {
            message: message.into(),
            sender,
        }
    }

    /// Builds a turn from text such as `"left"`.
    pub fn turn_from_str(direction: &str) -> Result<Self, ActionError> {
        Ok(Action::turn(direction.parse()?))
    }

    /// Builds a drop from text such as `"orange"`.
    pub fn drop_from_str(colour: &str) -> Result<Self, ActionError> {
        Ok(Action::drop_dirt(colour.parse()?))
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move => ActionKind::Move,
            Action::Turn { .. } => ActionKind::Turn,
            Action::Clean => ActionKind::Clean,
            Action::Drop { .. } => ActionKind::Drop,
            Action::Speak { .. } => ActionKind::Speak,
            Action::Broadcast { .. } => ActionKind::Broadcast,
            Action::Idle => ActionKind::Idle,
        }
    }

    /// The kind this action is charged as.
    ///
    /// A speak with nobody to speak to goes to everyone, and costs as much.
    pub fn billing_kind(&self) -> ActionKind {
        match self {
            Action::Speak { recipients, .. } if recipients.is_empty() => ActionKind::Broadcast,
            other => other.kind(),
        }
    }

    pub fn is_physical(&self) -> bool {
        self.kind().is_physical()
    }

    pub fn is_communicative(&self) -> bool {
        !self.is_physical()
    }
}

/// The kind of an action, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Move,
    Turn,
    Clean,
    Drop,
    Speak,
    Broadcast,
    Idle,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Move,
        ActionKind::Turn,
        ActionKind::Clean,
        ActionKind::Drop,
        ActionKind::Speak,
        ActionKind::Broadcast,
        ActionKind::Idle,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Turn => "turn",
            ActionKind::Clean => "clean",
            ActionKind::Drop => "drop",
            ActionKind::Speak => "speak",
            ActionKind::Broadcast => "broadcast",
            ActionKind::Idle => "idle",
        }
    }

    pub const fn is_physical(self) -> bool {
        !matches!(self, ActionKind::Speak | ActionKind::Broadcast)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| ActionError::UnknownKind(s.to_string()))
    }
}

/// An action paired with the actor performing it.
///
/// Minds build bare [`Action`]s; the environment attaches the actor id when it
/// dispatches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedAction {
    pub actor: EntityId,
    pub action: Action,
}

/// Represents the outcome of executing one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    /// The preconditions did not hold; nothing was attempted.
    Impossible,
    Success,
    /// Attempted, but the attempt or its postcondition check failed.
    Failure,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionOutcome::Impossible => "impossible",
            ActionOutcome::Success => "success",
            ActionOutcome::Failure => "failure",
        })
    }
}

/// Cost of each action kind, keyed by kind name.
///
/// Kinds missing from the table cost [`EffortTable::DEFAULT_COST`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortTable {
    costs: BTreeMap<String, u64>,
}

impl Default for EffortTable {
    fn default() -> Self {
        EffortTable {
            costs: ActionKind::ALL
                .into_iter()
                .map(|kind| (kind.name().to_string(), Self::DEFAULT_COST))
                .collect(),
        }
    }
}

impl EffortTable {
    pub const DEFAULT_COST: u64 = 1;

    /// The default table with `overrides` applied on top.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a u64)>,
    {
        let mut table = Self::default();
        for (name, cost) in overrides {
            table.costs.insert(name.to_ascii_lowercase(), *cost);
        }
        table
    }

    /// Cost of a kind by name.
    pub fn cost_of(&self, kind: &str) -> u64 {
        self.costs.get(kind).copied().unwrap_or(Self::DEFAULT_COST)
    }

    /// Cost charged for dispatching `action`.
    pub fn cost(&self, action: &Action) -> u64 {
        self.cost_of(action.billing_kind().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_and_communicative_partition() {
        assert!(Action::Move.is_physical());
        assert!(Action::turn(Direction::Left).is_physical());
        assert!(Action::Clean.is_physical());
        assert!(Action::drop_dirt(DirtColour::Green).is_physical());
        assert!(Action::Idle.is_physical());
        assert!(Action::speak("hi", vec![1], 0).is_communicative());
        assert!(Action::broadcast("hi", 0).is_communicative());
    }

    #[test]
    fn malformed_actions_fail_at_construction() {
        assert_eq!(
            Action::turn_from_str("around"),
            Err(ActionError::InvalidDirection("around".to_string()))
        );
        assert_eq!(
            Action::drop_from_str("purple"),
            Err(ActionError::InvalidDirtColour("purple".to_string()))
        );
        assert_eq!(
            Action::turn_from_str("right"),
            Ok(Action::turn(Direction::Right))
        );
    }

    #[test]
    fn unlisted_kinds_cost_one() {
        let table = EffortTable::default();
        assert_eq!(table.cost_of("move"), 1);
        assert_eq!(table.cost_of("teleport"), 1);
    }

    #[test]
    fn overrides_replace_defaults() {
        let overrides: BTreeMap<String, u64> =
            [("Move".to_string(), 3), ("broadcast".to_string(), 5)].into();
        let table = EffortTable::with_overrides(&overrides);
        assert_eq!(table.cost(&Action::Move), 3);
        assert_eq!(table.cost(&Action::Clean), 1);
        assert_eq!(table.cost(&Action::broadcast("x", 0)), 5);
    }

    #[test]
    fn speak_without_recipients_bills_as_broadcast() {
        let overrides: BTreeMap<String, u64> =
            [("speak".to_string(), 2), ("broadcast".to_string(), 7)].into();
        let table = EffortTable::with_overrides(&overrides);
        assert_eq!(table.cost(&Action::speak("x", vec![3], 0)), 2);
        assert_eq!(table.cost(&Action::speak("x", vec![], 0)), 7);
        assert_eq!(Action::speak("x", vec![], 0).kind(), ActionKind::Speak);
    }

    #[test]
    fn kinds_parse_by_name() {
        assert_eq!("Clean".parse::<ActionKind>(), Ok(ActionKind::Clean));
        assert!("dance".parse::<ActionKind>().is_err());
    }

    #[test]
    fn actions_serialize_with_a_kind_tag() {
        let json = serde_json::to_string(&Action::turn(Direction::Left)).unwrap();
        assert_eq!(json, r#"{"kind":"turn","direction":"left"}"#);
        let back: Action = serde_json::from_str(r#"{"kind":"drop","colour":"green"}"#).unwrap();
        assert_eq!(back, Action::drop_dirt(DirtColour::Green));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    EntityId,
    action::{ActionKind, ActionOutcome},
    ambient::Ambient,
    geometry::Coord,
    location::{ActorAppearance, Location},
};

/// A cell position relative to an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativePosition {
    Center,
    Forward,
    Left,
    Right,
    ForwardLeft,
    ForwardRight,
}

impl RelativePosition {
    pub const ALL: [RelativePosition; 6] = [
        RelativePosition::Center,
        RelativePosition::Forward,
        RelativePosition::Left,
        RelativePosition::Right,
        RelativePosition::ForwardLeft,
        RelativePosition::ForwardRight,
    ];

    /// The absolute coordinate this position maps to for an actor standing on
    /// `origin` and facing its current orientation.
    pub fn resolve(self, origin: Coord, actor: &ActorAppearance) -> Coord {
        let o = actor.orientation();
        match self {
            RelativePosition::Center => origin,
            RelativePosition::Forward => origin.forward(o),
            RelativePosition::Left => origin.left(o),
            RelativePosition::Right => origin.right(o),
            RelativePosition::ForwardLeft => origin.forward_left(o),
            RelativePosition::ForwardRight => origin.forward_right(o),
        }
    }
}

/// What an actor perceives after acting: the cells around it and how its
/// actions went.
///
/// Cells out of the grid are simply missing. Every location is a copy taken
/// when the observation was built, so later changes to the world never show up
/// in an observation that has already been produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    observer: EntityId,
    locations: BTreeMap<RelativePosition, Location>,
    outcomes: Vec<(ActionKind, ActionOutcome)>,
}

impl Observation {
    /// Builds the observation of actor `observer` from the current world.
    ///
    /// # Panics
    ///
    /// Panics if `observer` is not in the world.
    pub fn generate(
        ambient: &Ambient,
        observer: EntityId,
        outcomes: Vec<(ActionKind, ActionOutcome)>,
    ) -> Self {
        let origin = ambient
            .actor_coord(observer)
            .unwrap_or_else(|| panic!("observer {observer} is not in the grid"));
        let center = ambient.location_at(origin);
        let actor = center
            .actor()
            .unwrap_or_else(|| panic!("actor index points at empty cell {origin} for {observer}"));

        let locations = RelativePosition::ALL
            .into_iter()
            .filter_map(|position| {
                ambient
                    .get(position.resolve(origin, actor))
                    .map(|location| (position, location.clone()))
            })
            .collect();

        Observation {
            observer,
            locations,
            outcomes,
        }
    }

    /// Folds several observations of one tick into one.
    ///
    /// The locations of the last observation win; outcomes are concatenated in
    /// the order given. Returns `None` for an empty input.
    pub fn merge<I>(observations: I) -> Option<Self>
    where
        I: IntoIterator<Item = Observation>,
    {
        observations.into_iter().reduce(|mut merged, next| {
            debug_assert_eq!(merged.observer, next.observer);
            merged.locations = next.locations;
            merged.outcomes.extend(next.outcomes);
            merged
        })
    }

    pub fn observer(&self) -> EntityId {
        self.observer
    }

    pub fn get(&self, position: RelativePosition) -> Option<&Location> {
        self.locations.get(&position)
    }

    /// The observer's own cell. Always present.
    pub fn center(&self) -> &Location {
        &self.locations[&RelativePosition::Center]
    }

    /// The observer as it appears in its own cell.
    pub fn me(&self) -> Option<&ActorAppearance> {
        self.center().actor()
    }

    pub fn forward(&self) -> Option<&Location> {
        self.get(RelativePosition::Forward)
    }

    pub fn locations(&self) -> impl Iterator<Item = (RelativePosition, &Location)> {
        self.locations.iter().map(|(position, location)| (*position, location))
    }

    /// Outcomes of the actions attempted, in attempt order.
    pub fn outcomes(&self) -> &[(ActionKind, ActionOutcome)] {
        &self.outcomes
    }

    /// Outcome of the most recent attempt of `kind`, if any.
    pub fn outcome_of(&self, kind: ActionKind) -> Option<ActionOutcome> {
        self.outcomes
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }
}

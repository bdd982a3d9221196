use std::{
    cell::RefCell,
    collections::{BTreeSet, VecDeque},
    rc::Rc,
};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Colour, DirtColour,
    action::{Action, ActionKind, ActionOutcome},
    geometry::{Coord, Direction},
    message::{Message, Perception},
    observation::{Observation, RelativePosition},
};

/// Trait defining the decision unit behind an actor.
///
/// Each tick the environment first hands the mind what its actor perceived
/// (`revise`), then asks what to do (`decide`). A mind never touches the world
/// directly.
pub trait Mind {
    /// Updates internal state from the latest perception.
    fn revise(&mut self, observation: &Observation, messages: &[Message]);

    /// Chooses this tick's actions: at most one physical and at most one
    /// communicative. An empty decision means idling.
    fn decide(&mut self) -> Decision;

    /// Short name recorded in snapshots so a loader can rebuild the mind.
    fn name(&self) -> &str {
        "custom"
    }
}

/// The actions a mind chose for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    actions: Vec<Action>,
}

impl Decision {
    /// Do nothing this tick.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn act(action: Action) -> Self {
        Decision {
            actions: vec![action],
        }
    }

    /// Adds another action to the decision.
    pub fn and(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    pub fn physical_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_physical()).count()
    }

    pub fn communicative_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_communicative()).count()
    }
}

impl From<Vec<Action>> for Decision {
    fn from(actions: Vec<Action>) -> Self {
        Decision { actions }
    }
}

/// Builds one of the bundled minds by name.
///
/// Known names: `idle`, `random`, `cleaner`, `user`. Returns `None` for any
/// other name.
pub fn bundled(name: &str, seed: u64) -> Option<Box<dyn Mind>> {
    match name {
        "idle" => Some(Box::new(IdleMind)),
        "random" => Some(Box::new(RandomMind::new(seed))),
        "cleaner" => Some(Box::new(CleanerMind::new())),
        "user" => Some(Box::new(UserMind::new(seed))),
        _ => None,
    }
}

/// The bundled mind that suits an actor of `colour` best.
pub fn default_for(colour: Colour, seed: u64) -> Box<dyn Mind> {
    match colour {
        Colour::User => Box::new(UserMind::new(seed)),
        _ => Box::new(CleanerMind::new()),
    }
}

/// A mind that never does anything.
#[derive(Debug, Default)]
pub struct IdleMind;

impl Mind for IdleMind {
    fn revise(&mut self, _observation: &Observation, _messages: &[Message]) {}

    fn decide(&mut self) -> Decision {
        Decision::idle()
    }

    fn name(&self) -> &str {
        "idle"
    }
}

/// A mind that picks a random physical action each tick.
#[derive(Debug)]
pub struct RandomMind {
    rng: StdRng,
    colour: Option<Colour>,
}

impl RandomMind {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            colour: None,
        }
    }
}

impl Mind for RandomMind {
    fn revise(&mut self, observation: &Observation, _messages: &[Message]) {
        self.colour = observation.me().map(|me| me.colour());
    }

    fn decide(&mut self) -> Decision {
        let choices = if self.colour == Some(Colour::User) { 6 } else { 5 };
        let action = match self.rng.random_range(0..choices) {
            0 => Action::Move,
            1 => Action::turn(Direction::Left),
            2 => Action::turn(Direction::Right),
            3 => Action::Clean,
            4 => Action::Idle,
            _ => Action::drop_dirt(random_dirt_colour(&mut self.rng)),
        };
        Decision::act(action)
    }

    fn name(&self) -> &str {
        "random"
    }
}

fn random_dirt_colour(rng: &mut StdRng) -> DirtColour {
    if rng.random_bool(0.5) {
        DirtColour::Green
    } else {
        DirtColour::Orange
    }
}

/// A reactive cleaning agent.
///
/// Cleans what it stands on when it can, heads for cleanable dirt it sees,
/// otherwise walks forward and turns right at obstacles. Dirt it cannot clean
/// is announced once to everyone else.
#[derive(Debug, Default)]
pub struct CleanerMind {
    latest: Option<Observation>,
    announced: BTreeSet<Coord>,
    heard: Vec<Message>,
}

impl CleanerMind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    pub fn heard(&self) -> &[Message] {
        &self.heard
    }

    fn physical(&self, observation: &Observation) -> Action {
        let Some(me) = observation.me() else {
            return Action::Idle;
        };
        let can_clean = |position: RelativePosition| {
            observation
                .get(position)
                .and_then(|location| location.dirt())
                .is_some_and(|dirt| me.colour().can_clean(dirt.colour()))
        };
        let free = |position: RelativePosition| {
            observation
                .get(position)
                .is_some_and(|location| !location.has_actor())
        };

        // Clean here, then chase visible dirt, then wander
        if can_clean(RelativePosition::Center) {
            Action::Clean
        } else if can_clean(RelativePosition::Forward) && free(RelativePosition::Forward) {
            Action::Move
        } else if can_clean(RelativePosition::Left) {
            Action::turn(Direction::Left)
        } else if can_clean(RelativePosition::Right) {
            Action::turn(Direction::Right)
        } else if free(RelativePosition::Forward)
            && observation.outcome_of(ActionKind::Move) != Some(ActionOutcome::Impossible)
        {
            Action::Move
        } else {
            Action::turn(Direction::Right)
        }
    }

    fn announcement(&mut self, observation: &Observation) -> Option<Action> {
        let me = observation.me()?;
        let mut sightings = Vec::new();
        for (_, location) in observation.locations() {
            if let Some(dirt) = location.dirt() {
                if !me.colour().can_clean(dirt.colour()) && self.announced.insert(location.coord())
                {
                    sightings.push(format!("{} dirt at {}", dirt.colour(), location.coord()));
                }
            }
        }
        if sightings.is_empty() || me.colour() == Colour::User {
            None
        } else {
            Some(Action::broadcast(sightings.join("; "), me.id()))
        }
    }
}

impl Mind for CleanerMind {
    fn revise(&mut self, observation: &Observation, messages: &[Message]) {
        // Cleaned or not, a cell we stand on can be reported again later.
        self.announced.remove(&observation.center().coord());
        self.heard.extend_from_slice(messages);
        self.latest = Some(observation.clone());
    }

    fn decide(&mut self) -> Decision {
        let Some(observation) = self.latest.take() else {
            return Decision::idle();
        };
        let decision = Decision::act(self.physical(&observation));
        match self.announcement(&observation) {
            Some(broadcast) => decision.and(broadcast),
            None => decision,
        }
    }

    fn name(&self) -> &str {
        "cleaner"
    }
}

/// The user: wanders around and now and then drops dirt.
#[derive(Debug)]
pub struct UserMind {
    rng: StdRng,
    latest: Option<Observation>,
    drop_chance: f64,
}

impl UserMind {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            latest: None,
            drop_chance: 0.25,
        }
    }

    pub fn with_drop_chance(mut self, chance: f64) -> Self {
        self.drop_chance = chance.clamp(0.0, 1.0);
        self
    }
}

impl Mind for UserMind {
    fn revise(&mut self, observation: &Observation, _messages: &[Message]) {
        self.latest = Some(observation.clone());
    }

    fn decide(&mut self) -> Decision {
        let Some(observation) = self.latest.take() else {
            return Decision::idle();
        };
        // Drop on a clean cell now and then
        if !observation.center().has_dirt() && self.rng.random_bool(self.drop_chance) {
            return Decision::act(Action::drop_dirt(random_dirt_colour(&mut self.rng)));
        }
        let forward_free = observation
            .forward()
            .is_some_and(|location| !location.has_actor());
        if forward_free && self.rng.random_bool(0.75) {
            Decision::act(Action::Move)
        } else if self.rng.random_bool(0.5) {
            Decision::act(Action::turn(Direction::Left))
        } else {
            Decision::act(Action::turn(Direction::Right))
        }
    }

    fn name(&self) -> &str {
        "user"
    }
}

/// Shared record of what a [`ScriptedMind`] perceived, one entry per revise.
pub type PerceptionLog = Rc<RefCell<Vec<Perception>>>;

/// Replays a fixed queue of decisions, idling once it runs out, and records
/// every perception it is given.
#[derive(Debug, Default)]
pub struct ScriptedMind {
    script: VecDeque<Decision>,
    log: PerceptionLog,
}

impl ScriptedMind {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Decision>,
    {
        Self {
            script: script.into_iter().collect(),
            log: PerceptionLog::default(),
        }
    }

    /// A handle to the perception log that stays valid after the mind is
    /// handed to an environment.
    pub fn log(&self) -> PerceptionLog {
        Rc::clone(&self.log)
    }
}

impl Mind for ScriptedMind {
    fn revise(&mut self, observation: &Observation, messages: &[Message]) {
        self.log.borrow_mut().push(Perception {
            observation: observation.clone(),
            messages: messages.to_vec(),
        });
    }

    fn decide(&mut self) -> Decision {
        self.script.pop_front().unwrap_or_default()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

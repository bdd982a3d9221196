use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info, warn};

use crate::{
    Colour, DirtColour, EntityId, IdGenerator,
    action::{Action, ActionKind, ActionOutcome, EffortTable, TaggedAction},
    ambient::{Ambient, GridError},
    config::{ConfigError, SimulationConfig},
    executor::{self, Delivery, ExecutionContext},
    geometry::{Coord, Orientation},
    location::{ActorAppearance, DirtAppearance},
    message::Inbox,
    mind::{Decision, Mind},
    observation::Observation,
    snapshot::{LoadedActor, Snapshot, SnapshotError},
};

/// Errors that abort a tick.
///
/// These signal a broken mind, not a simulated event: ordinary action
/// failures are reported as [`ActionOutcome`]s instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    #[error(
        "actor {actor} chose {physical} physical and {communicative} communicative actions \
         in tick {tick}; at most one of each is allowed"
    )]
    BudgetExceeded {
        actor: EntityId,
        tick: u64,
        physical: usize,
        communicative: usize,
    },
}

/// Errors raised while building or editing an environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// A cancellation flag shared between the simulation loop and whoever drives it.
///
/// The loop only looks at it between ticks, so a stopped world is always in a
/// consistent, post-tick state.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears a previous stop request so the loop can be resumed.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What one actor did during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorReport {
    pub actor: EntityId,
    /// Outcomes in attempt order.
    pub outcomes: Vec<(ActionKind, ActionOutcome)>,
    pub effort_spent: u64,
}

/// Summary of one processed tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// One entry per actor, in cycle order.
    pub actors: Vec<ActorReport>,
    pub dirt_remaining: usize,
}

impl TickReport {
    pub fn for_actor(&self, actor: EntityId) -> Option<&ActorReport> {
        self.actors.iter().find(|report| report.actor == actor)
    }
}

/// An actor's cycle state: its mind, its inbox and the effort it has spent.
struct ActorSlot {
    id: EntityId,
    mind: Box<dyn Mind>,
    inbox: Inbox,
    effort: u64,
    /// A validated decision held back by an aborted tick, dispatched before
    /// the actor perceives again.
    pending: Option<Vec<Action>>,
}

/// Manages the simulation: the world, the actors' minds and the tick loop.
///
/// Actors take their turn in the order they were added, which is also
/// ascending id order. That order decides who wins when two actors want the
/// same cell in the same tick.
pub struct Environment {
    ambient: Ambient,
    config: SimulationConfig,
    effort_table: EffortTable,
    ids: IdGenerator,
    actors: Vec<ActorSlot>,
    tick: u64,
}

impl Environment {
    /// Creates an empty world of `config.grid_size`.
    pub fn new(config: SimulationConfig) -> Result<Self, EnvironmentError> {
        config.validate()?;
        let ambient = Ambient::new(config.grid_size);
        Ok(Self::with_ambient(ambient, config, IdGenerator::new()))
    }

    /// Rebuilds a world from a snapshot. `mind_for` supplies the mind of each
    /// loaded actor.
    pub fn from_snapshot<F>(
        snapshot: &Snapshot,
        config: SimulationConfig,
        mut mind_for: F,
    ) -> Result<Self, EnvironmentError>
    where
        F: FnMut(&LoadedActor) -> Box<dyn Mind>,
    {
        config.validate()?;
        config.check_grid_size(snapshot.size()?)?;

        let mut ids = IdGenerator::new();
        let (ambient, loaded) = snapshot.restore(&mut ids)?;
        let mut environment = Self::with_ambient(ambient, config, ids);
        for actor in &loaded {
            environment.attach(actor.id, mind_for(actor));
        }
        info!(
            size = environment.ambient.size(),
            actors = loaded.len(),
            dirt = environment.ambient.dirts().count(),
            "environment loaded from snapshot"
        );
        Ok(environment)
    }

    fn with_ambient(ambient: Ambient, config: SimulationConfig, ids: IdGenerator) -> Self {
        Environment {
            effort_table: config.effort_table(),
            ambient,
            config,
            ids,
            actors: Vec::new(),
            tick: 0,
        }
    }

    /// Binds `mind` to an actor already in the grid and gives it an initial
    /// observation so its first cycle has something to revise on.
    fn attach(&mut self, id: EntityId, mind: Box<dyn Mind>) {
        let mut inbox = Inbox::new();
        inbox.push_observation(Observation::generate(&self.ambient, id, Vec::new()));
        self.actors.push(ActorSlot {
            id,
            mind,
            inbox,
            effort: 0,
            pending: None,
        });
    }

    /// Adds an actor to the environment.
    pub fn add_actor(
        &mut self,
        coord: Coord,
        colour: Colour,
        orientation: Orientation,
        mind: Box<dyn Mind>,
    ) -> Result<EntityId, GridError> {
        let id = self.ids.next_id();
        self.ambient
            .place_actor(coord, ActorAppearance::new(id, colour, orientation))?;
        self.attach(id, mind);
        debug!(actor = id, %colour, %coord, %orientation, "actor added");
        Ok(id)
    }

    /// Removes an actor, returning its mind.
    pub fn remove_actor(&mut self, id: EntityId) -> Result<Box<dyn Mind>, GridError> {
        let index = self
            .slot_index(id)
            .ok_or(GridError::UnknownActor(id))?;
        self.ambient.take_actor(id)?;
        let slot = self.actors.remove(index);
        debug!(actor = id, "actor removed");
        Ok(slot.mind)
    }

    /// Adds a dirt item to the grid.
    pub fn add_dirt(&mut self, coord: Coord, colour: DirtColour) -> Result<EntityId, GridError> {
        let id = self.ids.next_id();
        self.ambient
            .place_dirt(coord, DirtAppearance::new(id, colour))?;
        Ok(id)
    }

    /// Removes a dirt item from the grid outside of the action pipeline.
    pub fn remove_dirt(&mut self, coord: Coord) -> Result<DirtAppearance, GridError> {
        self.ambient.clear_dirt(coord)
    }

    /// Processes one tick for all actors.
    ///
    /// Every actor first perceives, revises and decides against the same
    /// pre-tick world. Only once all decisions are in and valid are the actions
    /// executed, actor by actor in cycle order.
    ///
    /// If any actor breaks its action budget, nothing is executed, the tick
    /// counter does not advance and the first violation is returned. The
    /// offending actor gets its perception back and decides again next tick.
    /// Every other actor keeps its decision, which is dispatched next tick
    /// without a new perceive.
    pub fn process_tick(&mut self) -> Result<TickReport, CycleError> {
        let tick = self.tick + 1;

        // Decide
        let mut plans = Vec::with_capacity(self.actors.len());
        let mut violation = None;
        for slot in &mut self.actors {
            if let Some(actions) = slot.pending.take() {
                plans.push(Some(actions));
                continue;
            }
            let perception = slot.inbox.drain();
            if let Some(perception) = &perception {
                slot.mind
                    .revise(&perception.observation, &perception.messages);
            }
            let decision = slot.mind.decide();
            match validate(slot.id, tick, &decision) {
                Ok(()) => {
                    let mut actions = decision.into_actions();
                    if actions.is_empty() {
                        actions.push(Action::Idle);
                    }
                    plans.push(Some(actions));
                }
                Err(err) => {
                    if let Some(perception) = perception {
                        slot.inbox.requeue(perception);
                    }
                    if violation.is_none() {
                        violation = Some(err);
                    }
                    plans.push(None);
                }
            }
        }

        // Hold valid plans back until the whole tick can run
        if let Some(err) = violation {
            for (slot, plan) in self.actors.iter_mut().zip(plans) {
                slot.pending = plan;
            }
            return Err(err);
        }

        // Dispatch
        let mut outbox = Vec::new();
        let mut reports = Vec::with_capacity(plans.len());
        for (index, actions) in plans.into_iter().flatten().enumerate() {
            reports.push(self.process_actions(index, actions, &mut outbox));
        }
        self.route(outbox);

        self.tick = tick;
        let report = TickReport {
            tick,
            actors: reports,
            dirt_remaining: self.ambient.dirts().count(),
        };
        debug!(tick, dirt = report.dirt_remaining, "tick processed");
        Ok(report)
    }

    /// Executes one actor's actions and queues the resulting observations.
    fn process_actions(
        &mut self,
        index: usize,
        actions: Vec<Action>,
        outbox: &mut Vec<Delivery>,
    ) -> ActorReport {
        let actor = self.actors[index].id;
        let mut outcomes = Vec::with_capacity(actions.len());
        let mut spent: u64 = 0;

        for action in actions {
            let kind = action.kind();
            let cost = self.effort_table.cost(&action);
            let tagged = TaggedAction { actor, action };
            let outcome = {
                let mut ctx = ExecutionContext {
                    ambient: &mut self.ambient,
                    config: &self.config,
                    ids: &mut self.ids,
                    outbox: &mut *outbox,
                };
                executor::execute(&mut ctx, &tagged)
            };
            spent = spent.saturating_add(cost);
            debug!(tick = self.tick + 1, actor, %kind, %outcome, cost, "action dispatched");

            let observation = Observation::generate(&self.ambient, actor, vec![(kind, outcome)]);
            self.actors[index].inbox.push_observation(observation);
            outcomes.push((kind, outcome));
        }

        let slot = &mut self.actors[index];
        slot.effort = slot.effort.saturating_add(spent);
        ActorReport {
            actor,
            outcomes,
            effort_spent: spent,
        }
    }

    fn route(&mut self, outbox: Vec<Delivery>) {
        for Delivery { recipient, message } in outbox {
            match self.slot_index(recipient) {
                Some(index) => self.actors[index].inbox.push_message(message),
                None => warn!(recipient, "recipient vanished before delivery"),
            }
        }
    }

    /// Runs ticks until `max_ticks` have been processed (if given) or `stop`
    /// is raised. Returns the number of ticks processed.
    pub fn run(&mut self, max_ticks: Option<u64>, stop: &StopSignal) -> Result<u64, CycleError> {
        info!(start_tick = self.tick, ?max_ticks, actors = self.actors.len(), "run started");
        let mut processed = 0;
        while max_ticks.is_none_or(|max| processed < max) {
            if stop.is_stop_requested() {
                info!(tick = self.tick, "stop requested");
                break;
            }
            if let Err(err) = self.process_tick() {
                warn!(%err, "tick aborted");
                return Err(err);
            }
            processed += 1;
        }
        info!(tick = self.tick, processed, "run finished");
        Ok(processed)
    }

    /// Captures the current world, naming each actor's mind.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.ambient, |id| {
            self.slot_index(id)
                .map(|index| self.actors[index].mind.name().to_string())
        })
    }

    fn slot_index(&self, id: EntityId) -> Option<usize> {
        self.actors.iter().position(|slot| slot.id == id)
    }

    pub fn ambient(&self) -> &Ambient {
        &self.ambient
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn effort_table(&self) -> &EffortTable {
        &self.effort_table
    }

    /// Number of ticks processed so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Actor ids in cycle order.
    pub fn actor_ids(&self) -> Vec<EntityId> {
        self.actors.iter().map(|slot| slot.id).collect()
    }

    pub fn actor(&self, id: EntityId) -> Option<&ActorAppearance> {
        self.ambient.actor(id)
    }

    pub fn actor_coord(&self, id: EntityId) -> Option<Coord> {
        self.ambient.actor_coord(id)
    }

    /// Cumulative effort spent by actor `id`.
    pub fn effort(&self, id: EntityId) -> Option<u64> {
        self.slot_index(id).map(|index| self.actors[index].effort)
    }
}

fn validate(actor: EntityId, tick: u64, decision: &Decision) -> Result<(), CycleError> {
    let physical = decision.physical_count();
    let communicative = decision.communicative_count();
    if physical > 1 || communicative > 1 {
        warn!(actor, tick, physical, communicative, "action budget exceeded");
        return Err(CycleError::BudgetExceeded {
            actor,
            tick,
            physical,
            communicative,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Direction,
        mind::{IdleMind, ScriptedMind},
    };

    fn small_world() -> Environment {
        Environment::new(SimulationConfig::default().with_grid_size(5)).unwrap()
    }

    #[test]
    fn new_actor_receives_an_initial_observation() {
        let mut env = small_world();
        let mind = ScriptedMind::new([Decision::idle()]);
        let log = mind.log();
        let id = env
            .add_actor(Coord::new(2, 2), Colour::Green, Orientation::North, Box::new(mind))
            .unwrap();
        env.process_tick().unwrap();
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].observation.observer(), id);
        assert!(log[0].observation.outcomes().is_empty());
    }

    #[test]
    fn empty_decision_counts_as_idle() {
        let mut env = small_world();
        let id = env
            .add_actor(Coord::new(0, 0), Colour::White, Orientation::East, Box::new(IdleMind))
            .unwrap();
        let report = env.process_tick().unwrap();
        assert_eq!(
            report.for_actor(id).unwrap().outcomes,
            vec![(ActionKind::Idle, ActionOutcome::Success)]
        );
        assert_eq!(env.effort(id), Some(1));
        assert_eq!(env.tick(), 1);
    }

    #[test]
    fn two_physical_actions_abort_the_tick() {
        let mut env = small_world();
        let id = env
            .add_actor(
                Coord::new(1, 1),
                Colour::Green,
                Orientation::East,
                Box::new(ScriptedMind::new([
                    Decision::act(Action::Move).and(Action::turn(Direction::Left))
                ])),
            )
            .unwrap();
        let before = env.ambient().clone();
        let err = env.process_tick().unwrap_err();
        assert_eq!(
            err,
            CycleError::BudgetExceeded {
                actor: id,
                tick: 1,
                physical: 2,
                communicative: 0
            }
        );
        assert_eq!(env.ambient(), &before);
        assert_eq!(env.tick(), 0);
        assert_eq!(env.effort(id), Some(0));
    }

    #[test]
    fn aborted_tick_keeps_other_actors_decisions_and_perceptions() {
        let mut env = small_world();
        let walker_mind =
            ScriptedMind::new([Decision::act(Action::Move), Decision::act(Action::Move)]);
        let walker_log = walker_mind.log();
        let walker = env
            .add_actor(Coord::new(0, 0), Colour::White, Orientation::East, Box::new(walker_mind))
            .unwrap();
        let greedy_mind = ScriptedMind::new([
            Decision::act(Action::Move).and(Action::turn(Direction::Left)),
            Decision::idle(),
        ]);
        let greedy_log = greedy_mind.log();
        let greedy = env
            .add_actor(Coord::new(1, 2), Colour::Green, Orientation::East, Box::new(greedy_mind))
            .unwrap();

        assert!(env.process_tick().is_err());
        assert_eq!(env.actor_coord(walker), Some(Coord::new(0, 0)));
        assert_eq!(env.effort(walker), Some(0));

        // The walker's first decision runs without a second perceive
        let report = env.process_tick().unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(
            report.for_actor(walker).unwrap().outcomes,
            vec![(ActionKind::Move, ActionOutcome::Success)]
        );
        assert_eq!(env.actor_coord(walker), Some(Coord::new(1, 0)));
        assert_eq!(walker_log.borrow().len(), 1);

        // The offender saw the same perception again
        {
            let log = greedy_log.borrow();
            assert_eq!(log.len(), 2);
            assert_eq!(log[1], log[0]);
        }
        assert_eq!(
            report.for_actor(greedy).unwrap().outcomes,
            vec![(ActionKind::Idle, ActionOutcome::Success)]
        );

        // Then the walker perceives its move and makes its second decision
        env.process_tick().unwrap();
        let log = walker_log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1].observation.outcomes(),
            &[(ActionKind::Move, ActionOutcome::Success)]
        );
        assert_eq!(env.actor_coord(walker), Some(Coord::new(2, 0)));
    }

    #[test]
    fn effort_saturates_instead_of_overflowing() {
        let config = SimulationConfig::default()
            .with_grid_size(5)
            .with_effort(ActionKind::Move, u64::MAX)
            .with_effort(ActionKind::Broadcast, u64::MAX);
        assert!(config.validate().is_ok());
        let mut env = Environment::new(config).unwrap();
        let id = env
            .add_actor(
                Coord::new(0, 0),
                Colour::Green,
                Orientation::South,
                Box::new(ScriptedMind::new([
                    Decision::act(Action::Move).and(Action::broadcast("hi", 0)),
                    Decision::act(Action::Move),
                ])),
            )
            .unwrap();

        let report = env.process_tick().unwrap();
        assert_eq!(report.for_actor(id).unwrap().effort_spent, u64::MAX);
        env.process_tick().unwrap();
        assert_eq!(env.effort(id), Some(u64::MAX));
    }

    #[test]
    fn two_communicative_actions_abort_the_tick() {
        let mut env = small_world();
        let id = env
            .add_actor(
                Coord::new(1, 1),
                Colour::Green,
                Orientation::East,
                Box::new(ScriptedMind::new([Decision::act(Action::broadcast("a", 0))
                    .and(Action::broadcast("b", 0))])),
            )
            .unwrap();
        assert!(matches!(
            env.process_tick(),
            Err(CycleError::BudgetExceeded { actor, communicative: 2, .. }) if actor == id
        ));
    }

    #[test]
    fn effort_follows_the_table() {
        let config = SimulationConfig::default()
            .with_grid_size(5)
            .with_effort(ActionKind::Move, 3)
            .with_effort(ActionKind::Broadcast, 2);
        let mut env = Environment::new(config).unwrap();
        let mind = ScriptedMind::new([
            Decision::act(Action::Move).and(Action::speak("hello", vec![], 0)),
            Decision::act(Action::Move),
        ]);
        let id = env
            .add_actor(Coord::new(0, 0), Colour::Green, Orientation::South, Box::new(mind))
            .unwrap();
        let report = env.process_tick().unwrap();
        assert_eq!(report.for_actor(id).unwrap().effort_spent, 5);
        env.process_tick().unwrap();
        assert_eq!(env.effort(id), Some(8));
    }

    #[test]
    fn contention_is_resolved_by_actor_order() {
        let mut env = small_world();
        let first = env
            .add_actor(
                Coord::new(0, 1),
                Colour::Green,
                Orientation::East,
                Box::new(ScriptedMind::new([Decision::act(Action::Move)])),
            )
            .unwrap();
        let second = env
            .add_actor(
                Coord::new(2, 1),
                Colour::Orange,
                Orientation::West,
                Box::new(ScriptedMind::new([Decision::act(Action::Move)])),
            )
            .unwrap();
        let report = env.process_tick().unwrap();
        assert_eq!(
            report.for_actor(first).unwrap().outcomes,
            vec![(ActionKind::Move, ActionOutcome::Success)]
        );
        assert_eq!(
            report.for_actor(second).unwrap().outcomes,
            vec![(ActionKind::Move, ActionOutcome::Impossible)]
        );
        assert_eq!(env.actor_coord(first), Some(Coord::new(1, 1)));
        assert_eq!(env.actor_coord(second), Some(Coord::new(2, 1)));
    }

    #[test]
    fn stop_is_honoured_between_ticks() {
        let mut env = small_world();
        env.add_actor(Coord::new(0, 0), Colour::White, Orientation::East, Box::new(IdleMind))
            .unwrap();
        let stop = StopSignal::new();
        assert_eq!(env.run(Some(3), &stop), Ok(3));
        stop.request_stop();
        assert_eq!(env.run(None, &stop), Ok(0));
        assert_eq!(env.tick(), 3);
        stop.reset();
        assert_eq!(env.run(Some(2), &stop), Ok(2));
        assert_eq!(env.tick(), 5);
    }

    #[test]
    fn remove_actor_frees_its_cell() {
        let mut env = small_world();
        let id = env
            .add_actor(Coord::new(3, 3), Colour::User, Orientation::West, Box::new(IdleMind))
            .unwrap();
        let mind = env.remove_actor(id).unwrap();
        assert_eq!(mind.name(), "idle");
        assert!(!env.ambient().is_actor_at(Coord::new(3, 3)));
        assert!(env.actor_ids().is_empty());
        assert!(matches!(env.remove_actor(id), Err(GridError::UnknownActor(_))));
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = SimulationConfig::default().with_grid_size(1);
        assert!(matches!(
            Environment::new(config),
            Err(EnvironmentError::Config(ConfigError::SizeOutOfRange { .. }))
        ));
    }
}

//! Action execution.
//!
//! Every action kind has an executor implementing [`Executor`]. [`execute`]
//! matches on the action and runs the corresponding executor through the same
//! three steps: check preconditions, attempt, then re-check the postcondition.

use tracing::warn;

use crate::{
    Colour, DirtColour, EntityId, IdGenerator,
    action::{Action, ActionKind, ActionOutcome, TaggedAction},
    ambient::Ambient,
    config::SimulationConfig,
    geometry::{Coord, Direction},
    location::{ActorAppearance, DirtAppearance},
    message::Message,
};

/// Result of an attempt. An attempt can never be impossible: that is decided
/// before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Success,
    Failure,
}

/// A message on its way to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: EntityId,
    pub message: Message,
}

/// Everything an executor may read or change.
pub struct ExecutionContext<'a> {
    pub ambient: &'a mut Ambient,
    pub config: &'a SimulationConfig,
    pub ids: &'a mut IdGenerator,
    /// Messages produced by communicative actions, routed by the caller.
    pub outbox: &'a mut Vec<Delivery>,
}

/// The possible / attempt / succeeded contract of one action kind.
///
/// `origin` is where the acting actor stood when the action was dispatched.
pub trait Executor {
    /// The kind reported for this executor in logs.
    fn kind(&self) -> ActionKind;

    /// Precondition check. Must not mutate anything.
    fn is_possible(&self, ambient: &Ambient, origin: Coord) -> bool;

    /// Performs the action.
    fn attempt(&self, ctx: &mut ExecutionContext<'_>, origin: Coord) -> Attempt;

    /// Postcondition check, run only after a successful attempt.
    fn succeeded(&self, ambient: &Ambient, origin: Coord) -> bool;
}

/// Runs `executor` through the three-step contract.
pub fn run<E: Executor>(
    executor: &E,
    ctx: &mut ExecutionContext<'_>,
    origin: Coord,
) -> ActionOutcome {
    if !executor.is_possible(&*ctx.ambient, origin) {
        return ActionOutcome::Impossible;
    }
    match executor.attempt(ctx, origin) {
        Attempt::Success if executor.succeeded(&*ctx.ambient, origin) => ActionOutcome::Success,
        Attempt::Success => {
            warn!(kind = %executor.kind(), %origin, "postcondition check failed after attempt");
            ActionOutcome::Failure
        }
        Attempt::Failure => ActionOutcome::Failure,
    }
}

/// Executes one tagged action against the world.
///
/// # Panics
///
/// Panics if the acting actor is not in the world.
pub fn execute(ctx: &mut ExecutionContext<'_>, tagged: &TaggedAction) -> ActionOutcome {
    let actor = tagged.actor;
    let origin = ctx
        .ambient
        .actor_coord(actor)
        .unwrap_or_else(|| panic!("acting actor {actor} is not in the grid"));

    match &tagged.action {
        Action::Move => run(&MoveExecutor { actor }, ctx, origin),
        Action::Turn { direction } => run(
            &TurnExecutor {
                actor,
                direction: *direction,
            },
            ctx,
            origin,
        ),
        Action::Clean => run(&CleanExecutor { actor }, ctx, origin),
        Action::Drop { colour } => run(
            &DropExecutor {
                actor,
                colour: *colour,
            },
            ctx,
            origin,
        ),
        Action::Speak {
            message,
            recipients,
            sender,
        } => run(
            &SpeakExecutor {
                actor,
                message,
                recipients: Recipients::Listed(recipients),
                claimed_sender: *sender,
            },
            ctx,
            origin,
        ),
        Action::Broadcast { message, sender } => run(
            &SpeakExecutor {
                actor,
                message,
                recipients: Recipients::Everyone,
                claimed_sender: *sender,
            },
            ctx,
            origin,
        ),
        Action::Idle => run(&IdleExecutor, ctx, origin),
    }
}

/// The actor standing on `origin`, if it is `actor`.
fn actor_at(ambient: &Ambient, origin: Coord, actor: EntityId) -> Option<&ActorAppearance> {
    ambient
        .get(origin)?
        .actor()
        .filter(|appearance| appearance.id() == actor)
}

pub struct MoveExecutor {
    pub actor: EntityId,
}

impl MoveExecutor {
    fn target(&self, ambient: &Ambient, origin: Coord) -> Option<Coord> {
        let me = actor_at(ambient, origin, self.actor)?;
        Some(origin.forward(me.orientation()))
    }
}

impl Executor for MoveExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::Move
    }

    fn is_possible(&self, ambient: &Ambient, origin: Coord) -> bool {
        self.target(ambient, origin)
            .and_then(|target| ambient.get(target))
            .is_some_and(|location| !location.has_actor())
    }

    fn attempt(&self, ctx: &mut ExecutionContext<'_>, origin: Coord) -> Attempt {
        match self.target(ctx.ambient, origin) {
            // Check bounds and occupancy again right before moving
            Some(target) if ctx.ambient.contains(target) && !ctx.ambient.is_actor_at(target) => {
                ctx.ambient.move_actor(origin, target);
                Attempt::Success
            }
            // Actor gone or cell taken since the precondition check
            _ => Attempt::Failure,
        }
    }

    fn succeeded(&self, ambient: &Ambient, origin: Coord) -> bool {
        let Some(now) = ambient.actor_coord(self.actor) else {
            return false;
        };
        let Some(me) = ambient.actor(self.actor) else {
            return false;
        };
        now == origin.forward(me.orientation()) && !ambient.is_actor_at(origin)
    }
}

pub struct TurnExecutor {
    pub actor: EntityId,
    pub direction: Direction,
}

impl Executor for TurnExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::Turn
    }

    fn is_possible(&self, _ambient: &Ambient, _origin: Coord) -> bool {
        true
    }

    fn attempt(&self, ctx: &mut ExecutionContext<'_>, origin: Coord) -> Attempt {
        if actor_at(ctx.ambient, origin, self.actor).is_none() {
            return Attempt::Failure;
        }
        ctx.ambient.turn_actor(origin, self.direction);
        Attempt::Success
    }

    fn succeeded(&self, ambient: &Ambient, origin: Coord) -> bool {
        actor_at(ambient, origin, self.actor).is_some_and(|me| {
            me.orientation() == me.previous_orientation().rotate(self.direction)
        })
    }
}

pub struct CleanExecutor {
    pub actor: EntityId,
}

impl Executor for CleanExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::Clean
    }

    fn is_possible(&self, ambient: &Ambient, origin: Coord) -> bool {
        let Some(me) = actor_at(ambient, origin, self.actor) else {
            return false;
        };
        ambient
            .location_at(origin)
            .dirt()
            .is_some_and(|dirt| me.colour().can_clean(dirt.colour()))
    }

    fn attempt(&self, ctx: &mut ExecutionContext<'_>, origin: Coord) -> Attempt {
        if !ctx.ambient.is_dirt_at(origin) {
            return Attempt::Failure;
        }
        ctx.ambient.remove_dirt(origin);
        Attempt::Success
    }

    fn succeeded(&self, ambient: &Ambient, origin: Coord) -> bool {
        !ambient.is_dirt_at(origin)
    }
}

pub struct DropExecutor {
    pub actor: EntityId,
    pub colour: DirtColour,
}

impl Executor for DropExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::Drop
    }

    fn is_possible(&self, ambient: &Ambient, origin: Coord) -> bool {
        actor_at(ambient, origin, self.actor)
            .is_some_and(|me| me.colour() == Colour::User)
            && !ambient.is_dirt_at(origin)
    }

    fn attempt(&self, ctx: &mut ExecutionContext<'_>, origin: Coord) -> Attempt {
        if ctx.ambient.is_dirt_at(origin) {
            return Attempt::Failure;
        }
        let dirt = DirtAppearance::new(ctx.ids.next_id(), self.colour);
        ctx.ambient.drop_dirt(origin, dirt);
        Attempt::Success
    }

    fn succeeded(&self, ambient: &Ambient, origin: Coord) -> bool {
        ambient
            .location_at(origin)
            .dirt()
            .is_some_and(|dirt| dirt.colour() == self.colour)
    }
}

/// Who a communicative action is addressed to.
pub enum Recipients<'a> {
    Listed(&'a [EntityId]),
    Everyone,
}

/// Executes both speak and broadcast; they differ only in their recipients.
pub struct SpeakExecutor<'a> {
    pub actor: EntityId,
    pub message: &'a str,
    pub recipients: Recipients<'a>,
    pub claimed_sender: EntityId,
}

impl SpeakExecutor<'_> {
    fn resolve_recipients(&self, ambient: &Ambient) -> Vec<EntityId> {
        match self.recipients {
            Recipients::Listed(listed) if !listed.is_empty() => {
                let mut resolved = Vec::with_capacity(listed.len());
                for &id in listed {
                    // Skip unknown and repeated recipients
                    if ambient.actor_coord(id).is_none() {
                        warn!(
                            sender = self.actor,
                            recipient = id,
                            "dropping message to unknown actor"
                        );
                    } else if !resolved.contains(&id) {
                        resolved.push(id);
                    }
                }
                resolved
            }
            // Broadcast, or a speak with nobody listed
            _ => ambient.actor_ids().filter(|id| *id != self.actor).collect(),
        }
    }
}

impl Executor for SpeakExecutor<'_> {
    fn kind(&self) -> ActionKind {
        match self.recipients {
            Recipients::Listed(_) => ActionKind::Speak,
            Recipients::Everyone => ActionKind::Broadcast,
        }
    }

    fn is_possible(&self, _ambient: &Ambient, _origin: Coord) -> bool {
        true
    }

    fn attempt(&self, ctx: &mut ExecutionContext<'_>, _origin: Coord) -> Attempt {
        if self.claimed_sender != self.actor && !ctx.config.allow_sender_spoofing {
            warn!(
                kind = %self.kind(),
                actor = self.actor,
                claimed = self.claimed_sender,
                "rejecting message with a spoofed sender id"
            );
            return Attempt::Failure;
        }
        // One delivery per recipient, routed after the tick
        for recipient in self.resolve_recipients(ctx.ambient) {
            ctx.outbox.push(Delivery {
                recipient,
                message: Message {
                    sender: self.claimed_sender,
                    content: self.message.to_string(),
                },
            });
        }
        Attempt::Success
    }

    fn succeeded(&self, _ambient: &Ambient, _origin: Coord) -> bool {
        true
    }
}

pub struct IdleExecutor;

impl Executor for IdleExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::Idle
    }

    fn is_possible(&self, _ambient: &Ambient, _origin: Coord) -> bool {
        true
    }

    fn attempt(&self, _ctx: &mut ExecutionContext<'_>, _origin: Coord) -> Attempt {
        Attempt::Success
    }

    fn succeeded(&self, _ambient: &Ambient, _origin: Coord) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;

    struct Harness {
        ambient: Ambient,
        config: SimulationConfig,
        ids: IdGenerator,
        outbox: Vec<Delivery>,
    }

    impl Harness {
        fn new(size: usize) -> Self {
            let mut ids = IdGenerator::new();
            ids.skip_past(100);
            Harness {
                ambient: Ambient::new(size),
                config: SimulationConfig::default(),
                ids,
                outbox: Vec::new(),
            }
        }

        fn actor(&mut self, id: EntityId, at: Coord, colour: Colour, o: Orientation) -> &mut Self {
            self.ambient
                .place_actor(at, ActorAppearance::new(id, colour, o))
                .unwrap();
            self
        }

        fn dirt(&mut self, at: Coord, colour: DirtColour) -> &mut Self {
            let id = self.ids.next_id();
            self.ambient
                .place_dirt(at, DirtAppearance::new(id, colour))
                .unwrap();
            self
        }

        fn exec(&mut self, actor: EntityId, action: Action) -> ActionOutcome {
            let mut ctx = ExecutionContext {
                ambient: &mut self.ambient,
                config: &self.config,
                ids: &mut self.ids,
                outbox: &mut self.outbox,
            };
            execute(&mut ctx, &TaggedAction { actor, action })
        }
    }

    #[test]
    fn move_into_free_cell_succeeds() {
        let mut h = Harness::new(5);
        h.actor(1, Coord::new(0, 0), Colour::Green, Orientation::East);
        assert_eq!(h.exec(1, Action::Move), ActionOutcome::Success);
        assert_eq!(h.ambient.actor_coord(1), Some(Coord::new(1, 0)));
        assert!(!h.ambient.is_actor_at(Coord::new(0, 0)));
        assert_eq!(h.ambient.actor(1).unwrap().orientation(), Orientation::East);
    }

    #[test]
    fn move_off_the_grid_is_impossible() {
        let mut h = Harness::new(5);
        h.actor(1, Coord::new(0, 0), Colour::Green, Orientation::North);
        assert_eq!(h.exec(1, Action::Move), ActionOutcome::Impossible);
        assert_eq!(h.ambient.actor_coord(1), Some(Coord::new(0, 0)));
    }

    #[test]
    fn move_into_actor_is_impossible() {
        let mut h = Harness::new(5);
        h.actor(1, Coord::new(1, 1), Colour::Green, Orientation::South)
            .actor(2, Coord::new(1, 2), Colour::Orange, Orientation::North);
        assert_eq!(h.exec(1, Action::Move), ActionOutcome::Impossible);
        assert_eq!(h.ambient.actor_coord(1), Some(Coord::new(1, 1)));
        assert_eq!(h.ambient.actor_coord(2), Some(Coord::new(1, 2)));
    }

    #[test]
    fn move_onto_dirt_is_allowed() {
        let mut h = Harness::new(3);
        h.actor(1, Coord::new(0, 0), Colour::Green, Orientation::South)
            .dirt(Coord::new(0, 1), DirtColour::Orange);
        assert_eq!(h.exec(1, Action::Move), ActionOutcome::Success);
        let here = h.ambient.location_at(Coord::new(0, 1));
        assert!(here.has_actor() && here.has_dirt());
    }

    #[test]
    fn turn_always_possible_and_rotates() {
        let mut h = Harness::new(3);
        h.actor(1, Coord::new(0, 0), Colour::White, Orientation::North);
        assert_eq!(h.exec(1, Action::turn(Direction::Left)), ActionOutcome::Success);
        assert_eq!(h.ambient.actor(1).unwrap().orientation(), Orientation::West);
        assert_eq!(h.exec(1, Action::turn(Direction::Right)), ActionOutcome::Success);
        assert_eq!(h.ambient.actor(1).unwrap().orientation(), Orientation::North);
    }

    #[test]
    fn clean_colour_matrix() {
        let cases = [
            (Colour::White, DirtColour::Green, ActionOutcome::Success),
            (Colour::White, DirtColour::Orange, ActionOutcome::Success),
            (Colour::Green, DirtColour::Green, ActionOutcome::Success),
            (Colour::Green, DirtColour::Orange, ActionOutcome::Impossible),
            (Colour::Orange, DirtColour::Orange, ActionOutcome::Success),
            (Colour::Orange, DirtColour::Green, ActionOutcome::Impossible),
            (Colour::User, DirtColour::Green, ActionOutcome::Impossible),
            (Colour::User, DirtColour::Orange, ActionOutcome::Impossible),
        ];
        for (actor, dirt, expected) in cases {
            let mut h = Harness::new(3);
            h.actor(1, Coord::new(1, 1), actor, Orientation::North)
                .dirt(Coord::new(1, 1), dirt);
            assert_eq!(h.exec(1, Action::Clean), expected, "{actor} cleaning {dirt}");
            let dirty = h.ambient.is_dirt_at(Coord::new(1, 1));
            assert_eq!(dirty, expected != ActionOutcome::Success);
        }
    }

    #[test]
    fn clean_without_dirt_is_impossible() {
        let mut h = Harness::new(3);
        h.actor(1, Coord::new(1, 1), Colour::White, Orientation::North);
        assert_eq!(h.exec(1, Action::Clean), ActionOutcome::Impossible);
    }

    #[test]
    fn only_user_drops_on_clean_cells() {
        let mut h = Harness::new(3);
        h.actor(1, Coord::new(0, 0), Colour::User, Orientation::North)
            .actor(2, Coord::new(2, 2), Colour::White, Orientation::North);

        assert_eq!(
            h.exec(2, Action::drop_dirt(DirtColour::Green)),
            ActionOutcome::Impossible
        );
        assert_eq!(
            h.exec(1, Action::drop_dirt(DirtColour::Orange)),
            ActionOutcome::Success
        );
        let dirt = h.ambient.location_at(Coord::new(0, 0)).dirt().copied().unwrap();
        assert_eq!(dirt.colour(), DirtColour::Orange);
        assert!(dirt.id() >= 100);
        assert_eq!(
            h.exec(1, Action::drop_dirt(DirtColour::Green)),
            ActionOutcome::Impossible
        );
    }

    #[test]
    fn speak_delivers_to_listed_recipients() {
        let mut h = Harness::new(4);
        h.actor(1, Coord::new(0, 0), Colour::Green, Orientation::North)
            .actor(2, Coord::new(1, 0), Colour::Orange, Orientation::North)
            .actor(3, Coord::new(2, 0), Colour::White, Orientation::North);
        assert_eq!(
            h.exec(1, Action::speak("go east", vec![3, 42], 1)),
            ActionOutcome::Success
        );
        assert_eq!(h.outbox.len(), 1);
        assert_eq!(h.outbox[0].recipient, 3);
        assert_eq!(h.outbox[0].message.sender, 1);
        assert_eq!(h.outbox[0].message.content, "go east");
    }

    #[test]
    fn broadcast_reaches_everyone_else() {
        let mut h = Harness::new(4);
        h.actor(1, Coord::new(0, 0), Colour::Green, Orientation::North)
            .actor(2, Coord::new(1, 0), Colour::Orange, Orientation::North)
            .actor(3, Coord::new(2, 0), Colour::White, Orientation::North);
        assert_eq!(h.exec(2, Action::broadcast("hi", 2)), ActionOutcome::Success);
        let recipients: Vec<_> = h.outbox.iter().map(|d| d.recipient).collect();
        assert_eq!(recipients, vec![1, 3]);

        h.outbox.clear();
        assert_eq!(h.exec(2, Action::speak("hi", vec![], 2)), ActionOutcome::Success);
        assert_eq!(h.outbox.len(), 2);
    }

    #[test]
    fn spoofed_sender_fails_unless_allowed() {
        let mut h = Harness::new(3);
        h.actor(1, Coord::new(0, 0), Colour::Green, Orientation::North)
            .actor(2, Coord::new(1, 0), Colour::Orange, Orientation::North);
        assert_eq!(
            h.exec(1, Action::speak("i am 2", vec![2], 2)),
            ActionOutcome::Failure
        );
        assert!(h.outbox.is_empty());

        h.config.allow_sender_spoofing = true;
        assert_eq!(
            h.exec(1, Action::speak("i am 2", vec![2], 2)),
            ActionOutcome::Success
        );
        assert_eq!(h.outbox.len(), 1);
        assert_eq!(h.outbox[0].message.sender, 2);
    }

    #[test]
    fn idle_changes_nothing() {
        let mut h = Harness::new(3);
        h.actor(1, Coord::new(1, 1), Colour::User, Orientation::South);
        let before = h.ambient.clone();
        assert_eq!(h.exec(1, Action::Idle), ActionOutcome::Success);
        assert_eq!(h.ambient, before);
    }

    #[test]
    fn speak_and_broadcast_report_their_own_kind() {
        let speak = SpeakExecutor {
            actor: 1,
            message: "hi",
            recipients: Recipients::Listed(&[2]),
            claimed_sender: 1,
        };
        assert_eq!(speak.kind(), ActionKind::Speak);

        let broadcast = SpeakExecutor {
            recipients: Recipients::Everyone,
            ..speak
        };
        assert_eq!(broadcast.kind(), ActionKind::Broadcast);
    }

    struct LyingExecutor;

    impl Executor for LyingExecutor {
        fn kind(&self) -> ActionKind {
        ActionKind::Idle
    }

        fn is_possible(&self, _ambient: &Ambient, _origin: Coord) -> bool {
            true
        }

        fn attempt(&self, _ctx: &mut ExecutionContext<'_>, _origin: Coord) -> Attempt {
            Attempt::Success
        }

        fn succeeded(&self, _ambient: &Ambient, _origin: Coord) -> bool {
            false
        }
    }

    #[test]
    fn failed_postcondition_downgrades_success() {
        let mut h = Harness::new(3);
        let mut ctx = ExecutionContext {
            ambient: &mut h.ambient,
            config: &h.config,
            ids: &mut h.ids,
            outbox: &mut h.outbox,
        };
        assert_eq!(
            run(&LyingExecutor, &mut ctx, Coord::new(0, 0)),
            ActionOutcome::Failure
        );
    }
}

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{EntityId, observation::Observation};

/// A message delivered from one actor to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The sender as claimed by the speaking actor.
    pub sender: EntityId,
    pub content: String,
}

/// Everything an actor perceives at the start of its cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Perception {
    pub observation: Observation,
    pub messages: Vec<Message>,
}

/// Per-actor buffers for perception produced during a tick.
///
/// One typed queue per kind of perception; both are drained together when
/// the actor perceives.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    observations: VecDeque<Observation>,
    messages: VecDeque<Message>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_observation(&mut self, observation: Observation) {
        self.observations.push_back(observation);
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    pub fn pending_observations(&self) -> usize {
        self.observations.len()
    }

    pub fn pending_messages(&self) -> usize {
        self.messages.len()
    }

    /// Puts a drained perception back in front of anything queued since, so
    /// the next [`drain`](Self::drain) returns it again.
    pub fn requeue(&mut self, perception: Perception) {
        self.observations.push_front(perception.observation);
        for message in perception.messages.into_iter().rev() {
            self.messages.push_front(message);
        }
    }

    /// Empties both queues, merging buffered observations into one.
    ///
    /// Returns `None` when no observation is buffered; any messages stay
    /// queued in that case.
    pub fn drain(&mut self) -> Option<Perception> {
        let observation = Observation::merge(self.observations.drain(..))?;
        Some(Perception {
            observation,
            messages: self.messages.drain(..).collect(),
        })
    }
}

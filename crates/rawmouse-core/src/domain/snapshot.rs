//! The logical result of one poll.

use super::event::{DiscreteEvent, MovementSample};

/// Everything drained from the aggregator by one poll: queued edges in
/// arrival order, then one movement sample per device that moved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub events: Vec<DiscreteEvent>,
    pub movements: Vec<MovementSample>,
}

impl Snapshot {
    /// Total number of records this snapshot serializes to.
    pub fn len(&self) -> usize {
        self.events.len() + self.movements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.movements.is_empty()
    }
}

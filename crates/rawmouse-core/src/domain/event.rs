//! Discrete events and accumulated movement.

use super::buttons::ButtonEdge;
use super::device::DeviceId;

/// What a [`DiscreteEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    Disconnect,
    ButtonPress,
    ButtonRelease,
}

/// An edge that happened once and is reported exactly once.
///
/// `pressed` and `released` hold a button id, or 0. A button event sets
/// exactly one of them; connect/disconnect events set neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscreteEvent {
    pub kind: EventKind,
    pub device: DeviceId,
    pub pressed: u8,
    pub released: u8,
}

impl DiscreteEvent {
    pub fn connect(device: DeviceId) -> Self {
        Self {
            kind: EventKind::Connect,
            device,
            pressed: 0,
            released: 0,
        }
    }

    pub fn disconnect(device: DeviceId) -> Self {
        Self {
            kind: EventKind::Disconnect,
            device,
            pressed: 0,
            released: 0,
        }
    }

    /// Builds a ButtonPress or ButtonRelease event from a decoded edge.
    pub fn button(device: DeviceId, edge: ButtonEdge) -> Self {
        let (pressed, released) = edge.as_pair();
        let kind = match edge {
            ButtonEdge::Pressed(_) => EventKind::ButtonPress,
            ButtonEdge::Released(_) => EventKind::ButtonRelease,
        };
        Self {
            kind,
            device,
            pressed,
            released,
        }
    }
}

/// Movement and wheel deltas summed for one device since the previous poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementSample {
    pub device: DeviceId,
    pub x: i32,
    pub y: i32,
    pub wheel: i32,
}

impl MovementSample {
    /// Returns `true` when there is nothing worth reporting.
    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0 && self.wheel == 0
    }
}

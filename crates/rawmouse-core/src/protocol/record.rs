//! Fixed-size poll records.
//!
//! Wire format of one poll buffer:
//! ```text
//! [count:4] then count x [device:4][x:4][y:4][wheel:4][pressed:1][released:1][kind:1][pad:1]
//! ```
//! All multi-byte integers are little-endian and signed. Records are 20 bytes
//! so that a C reader can overlay the buffer with a naturally aligned struct.

use std::fmt;

use crate::domain::device::DeviceId;
use crate::domain::event::{DiscreteEvent, EventKind, MovementSample};

/// Size of the leading record count.
pub const COUNT_SIZE: usize = 4;

/// Size of one record including the trailing padding byte.
pub const RECORD_SIZE: usize = 20;

pub(crate) const OFFSET_DEVICE: usize = 0;
pub(crate) const OFFSET_X: usize = 4;
pub(crate) const OFFSET_Y: usize = 8;
pub(crate) const OFFSET_WHEEL: usize = 12;
pub(crate) const OFFSET_PRESSED: usize = 16;
pub(crate) const OFFSET_RELEASED: usize = 17;
pub(crate) const OFFSET_KIND: usize = 18;

/// Record type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Connect = 0,
    Disconnect = 1,
    /// Button edge or accumulated movement.
    Mouse = 2,
}

impl TryFrom<u8> for RecordKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(RecordKind::Connect),
            1 => Ok(RecordKind::Disconnect),
            2 => Ok(RecordKind::Mouse),
            _ => Err(()),
        }
    }
}

/// One decoded (or about-to-be-encoded) poll record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRecord {
    pub device: DeviceId,
    pub x: i32,
    pub y: i32,
    pub wheel: i32,
    pub pressed: u8,
    pub released: u8,
    pub kind: RecordKind,
}

impl PollRecord {
    /// `true` for a Mouse record with no button bytes set.
    pub fn is_movement(&self) -> bool {
        self.kind == RecordKind::Mouse && self.pressed == 0 && self.released == 0
    }
}

impl From<&DiscreteEvent> for PollRecord {
    fn from(event: &DiscreteEvent) -> Self {
        let kind = match event.kind {
            EventKind::Connect => RecordKind::Connect,
            EventKind::Disconnect => RecordKind::Disconnect,
            EventKind::ButtonPress | EventKind::ButtonRelease => RecordKind::Mouse,
        };
        Self {
            device: event.device,
            x: 0,
            y: 0,
            wheel: 0,
            pressed: event.pressed,
            released: event.released,
            kind,
        }
    }
}

impl From<&MovementSample> for PollRecord {
    fn from(sample: &MovementSample) -> Self {
        Self {
            device: sample.device,
            x: sample.x,
            y: sample.y,
            wheel: sample.wheel,
            pressed: 0,
            released: 0,
            kind: RecordKind::Mouse,
        }
    }
}

impl fmt::Display for PollRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RecordKind::Connect => write!(f, "CONNECT    {}", self.device),
            RecordKind::Disconnect => write!(f, "DISCONNECT {}", self.device),
            RecordKind::Mouse => write!(
                f,
                "MOUSE      {} ({}; {})   DOWN={}  UP={}  w={}",
                self.device, self.x, self.y, self.pressed, self.released, self.wheel
            ),
        }
    }
}

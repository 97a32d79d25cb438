//! # rawmouse-core
//!
//! Shared types for the raw mouse capture service: device identities, the
//! discrete events and movement samples the aggregator produces, and the
//! binary snapshot format handed to the host on every poll.
//!
//! The crate has no OS dependencies. Hosts written in Rust can depend on it
//! directly to decode poll buffers with [`decode_snapshot`].
//!
//! # Architecture overview (for beginners)
//!
//! The capture service runs a background thread that receives raw mouse
//! notifications from the operating system. The host (a game engine, a
//! scripting runtime) cannot run that loop itself, so it *pulls* whatever has
//! accumulated by calling `poll` whenever it wants.
//!
//! - **`domain`** – What a poll is made of: a queue of edge events (connect,
//!   disconnect, button press/release) and one accumulated movement sample
//!   per device.
//!
//! - **`protocol`** – How a poll result travels across the C boundary: a
//!   4-byte little-endian record count followed by fixed 20-byte records.

pub mod domain;
pub mod protocol;

pub use domain::buttons::{ButtonEdge, ButtonFlags, ButtonId};
pub use domain::device::{DeviceId, DeviceInfo};
pub use domain::event::{DiscreteEvent, EventKind, MovementSample};
pub use domain::snapshot::Snapshot;
pub use protocol::codec::{decode_snapshot, encode_snapshot, SnapshotBuilder, WireError};
pub use protocol::record::{PollRecord, RecordKind, COUNT_SIZE, RECORD_SIZE};

//! Snapshot wire format and codec.

pub mod codec;
pub mod record;

pub use codec::{decode_snapshot, encode_snapshot, SnapshotBuilder, WireError};
pub use record::{PollRecord, RecordKind, COUNT_SIZE, RECORD_SIZE};

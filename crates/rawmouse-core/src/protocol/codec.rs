//! Binary codec for poll snapshots.
//!
//! Wire format:
//! ```text
//! [count:4][record:20] * count
//! ```
//! See [`crate::protocol::record`] for the record layout. All multi-byte
//! integers are little-endian.

use thiserror::Error;

use crate::domain::device::DeviceId;
use crate::domain::snapshot::Snapshot;
use crate::protocol::record::{
    PollRecord, RecordKind, COUNT_SIZE, OFFSET_DEVICE, OFFSET_KIND, OFFSET_PRESSED,
    OFFSET_RELEASED, OFFSET_WHEEL, OFFSET_X, OFFSET_Y, RECORD_SIZE,
};

/// Errors that can occur while decoding a poll buffer.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    /// The buffer is shorter than its count field says it should be.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("negative record count: {0}")]
    NegativeCount(i32),

    /// The kind byte of a record is not a recognized value.
    #[error("unknown record kind: {0}")]
    UnknownKind(u8),
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Incrementally writes a poll buffer.
///
/// The count field is reserved up front and filled in by [`finish`], so
/// records can be pushed straight from the aggregator without an
/// intermediate collection.
///
/// [`finish`]: SnapshotBuilder::finish
///
/// # Examples
///
/// ```rust
/// use rawmouse_core::{decode_snapshot, DeviceId, DiscreteEvent, PollRecord, SnapshotBuilder};
///
/// let mut builder = SnapshotBuilder::with_capacity(1);
/// builder.push(&PollRecord::from(&DiscreteEvent::connect(DeviceId(5))));
/// let bytes = builder.finish();
/// assert_eq!(bytes.len(), 24);
/// assert_eq!(decode_snapshot(&bytes).unwrap()[0].device, DeviceId(5));
/// ```
#[derive(Debug)]
pub struct SnapshotBuilder {
    buf: Vec<u8>,
    count: usize,
}

impl SnapshotBuilder {
    /// Creates a builder sized for `records` records.
    pub fn with_capacity(records: usize) -> Self {
        let mut buf = Vec::with_capacity(COUNT_SIZE + records * RECORD_SIZE);
        buf.extend_from_slice(&0i32.to_le_bytes());
        Self { buf, count: 0 }
    }

    /// Appends one record.
    pub fn push(&mut self, record: &PollRecord) {
        self.buf.extend_from_slice(&record.device.raw().to_le_bytes());
        self.buf.extend_from_slice(&record.x.to_le_bytes());
        self.buf.extend_from_slice(&record.y.to_le_bytes());
        self.buf.extend_from_slice(&record.wheel.to_le_bytes());
        self.buf.push(record.pressed);
        self.buf.push(record.released);
        self.buf.push(record.kind as u8);
        self.buf.push(0x00); // padding
        self.count += 1;
    }

    /// Number of records pushed so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Writes the count field and returns the finished buffer.
    pub fn finish(mut self) -> Vec<u8> {
        let count = i32::try_from(self.count).unwrap_or(i32::MAX);
        self.buf[..COUNT_SIZE].copy_from_slice(&count.to_le_bytes());
        self.buf
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

/// Serializes a snapshot: discrete events first, then movement samples.
pub fn encode_snapshot(snapshot: &Snapshot) -> Vec<u8> {
    let mut builder = SnapshotBuilder::with_capacity(snapshot.len());
    for event in &snapshot.events {
        builder.push(&PollRecord::from(event));
    }
    for sample in &snapshot.movements {
        builder.push(&PollRecord::from(sample));
    }
    builder.finish()
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Parses a poll buffer back into records.
///
/// Bytes after the last counted record are ignored.
///
/// # Errors
///
/// Returns [`WireError`] if the buffer is truncated, the count is negative,
/// or a record carries an unknown kind byte.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<PollRecord>, WireError> {
    let count = read_i32(bytes, 0)?;
    if count < 0 {
        return Err(WireError::NegativeCount(count));
    }
    let count = count as usize;

    // Saturates on targets where the declared length overflows usize.
    let needed = count
        .checked_mul(RECORD_SIZE)
        .and_then(|n| n.checked_add(COUNT_SIZE))
        .unwrap_or(usize::MAX);
    if bytes.len() < needed {
        return Err(WireError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }

    bytes[COUNT_SIZE..needed]
        .chunks_exact(RECORD_SIZE)
        .map(decode_record)
        .collect()
}

fn decode_record(rec: &[u8]) -> Result<PollRecord, WireError> {
    let kind_byte = rec[OFFSET_KIND];
    let kind = RecordKind::try_from(kind_byte).map_err(|_| WireError::UnknownKind(kind_byte))?;
    Ok(PollRecord {
        device: DeviceId(read_i32(rec, OFFSET_DEVICE)?),
        x: read_i32(rec, OFFSET_X)?,
        y: read_i32(rec, OFFSET_Y)?,
        wheel: read_i32(rec, OFFSET_WHEEL)?,
        pressed: rec[OFFSET_PRESSED],
        released: rec[OFFSET_RELEASED],
        kind,
    })
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32, WireError> {
    if buf.len() < offset + 4 {
        return Err(WireError::InsufficientData {
            needed: offset + 4,
            available: buf.len(),
        });
    }
    Ok(i32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! C ABI exported by the `rawmouse_capture` cdylib.
//!
//! A host that cannot run a native message loop loads the library and calls:
//!
//! ```c
//! bool        rawmouse_init(void);
//! int32_t     rawmouse_kill(void);
//! PollBuffer  rawmouse_poll(void);
//! void        rawmouse_free_buffer(PollBuffer buffer);
//! ```
//!
//! All four share one process-wide [`CaptureService`], created on the first
//! call together with the `tracing` subscriber and the loaded configuration.
//!
//! # Buffer ownership
//!
//! `rawmouse_poll` hands out a heap buffer owned by this library. The host
//! reads `len` bytes from `ptr` (layout in [`rawmouse_core::protocol::record`])
//! and must give the same `PollBuffer` back to `rawmouse_free_buffer` exactly
//! once. Freeing it any other way is undefined behavior.

use std::sync::OnceLock;

use tracing::warn;

use crate::application::lifecycle::{CaptureService, InitOutcome};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::notification_source::platform_source;
use crate::infrastructure::storage::config::{load_config, AppConfig};

static SERVICE: OnceLock<CaptureService> = OnceLock::new();

fn service() -> &'static CaptureService {
    SERVICE.get_or_init(|| {
        let loaded = load_config();
        let config = match &loaded {
            Ok(cfg) => cfg.clone(),
            Err(_) => AppConfig::default(),
        };
        init_logging(&config.service.log_level);
        if let Err(e) = loaded {
            warn!("using default configuration: {e}");
        }
        CaptureService::new(
            platform_source(&config.capture),
            config.service.shutdown_timeout(),
        )
    })
}

// ── Buffer hand-off ───────────────────────────────────────────────────────────

/// A poll result owned by this library until passed to
/// [`rawmouse_free_buffer`].
#[repr(C)]
#[derive(Debug)]
pub struct PollBuffer {
    pub ptr: *mut u8,
    pub len: usize,
}

impl PollBuffer {
    /// Leaks `bytes` into a buffer the host can read.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        let ptr = Box::into_raw(boxed) as *mut u8;
        Self { ptr, len }
    }

    /// A buffer that owns nothing.
    pub fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }

    /// Views the buffer contents.
    ///
    /// # Safety
    ///
    /// `self` must come from [`PollBuffer::from_vec`] and not have been freed.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.ptr.is_null() {
            return &[];
        }
        // SAFETY: upheld by the caller.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

/// Drains `service` into a host-owned buffer.
pub fn poll_buffer(service: &CaptureService) -> PollBuffer {
    PollBuffer::from_vec(service.poll_bytes())
}

// ── Exports ───────────────────────────────────────────────────────────────────

/// Starts (or restarts) capture.
///
/// Returns `true` only when the service was not already running and started
/// successfully. A restart, or a source that could not start, returns `false`.
#[no_mangle]
pub extern "C" fn rawmouse_init() -> bool {
    matches!(service().init(), Ok(InitOutcome::Fresh))
}

/// Stops capture without waiting for the capture thread.
///
/// Returns the OS status of the stop request, 0 when none was recorded.
#[no_mangle]
pub extern "C" fn rawmouse_kill() -> i32 {
    service().kill().os_status as i32
}

/// Drains everything captured since the previous poll.
///
/// The returned buffer must be released with [`rawmouse_free_buffer`].
#[no_mangle]
pub extern "C" fn rawmouse_poll() -> PollBuffer {
    poll_buffer(service())
}

/// Releases a buffer returned by [`rawmouse_poll`]. A null `ptr` is ignored.
///
/// # Safety
///
/// `buffer` must have been returned by [`rawmouse_poll`] and not freed
/// before; its fields must be unmodified.
#[no_mangle]
pub unsafe extern "C" fn rawmouse_free_buffer(buffer: PollBuffer) {
    if buffer.ptr.is_null() {
        return;
    }
    // SAFETY: ptr/len describe a boxed slice leaked by PollBuffer::from_vec.
    unsafe {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
            buffer.ptr, buffer.len,
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::notification_source::mock::MockSource;
    use rawmouse_core::{decode_snapshot, DeviceId, RecordKind};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_poll_buffer_carries_drained_records() {
        // Arrange
        let source = Arc::new(MockSource::new());
        let svc = CaptureService::new(source.clone(), Duration::from_secs(1));
        svc.init().expect("init");
        source.connect(DeviceId(11), "TestMouse");
        let deadline = Instant::now() + Duration::from_secs(5);
        while svc.processed_notifications() < 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        // Act
        let buffer = poll_buffer(&svc);

        // Assert
        // SAFETY: buffer was just produced and is freed below.
        let records = decode_snapshot(unsafe { buffer.as_slice() }).expect("decode");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::Connect);
        assert_eq!(records[0].device, DeviceId(11));
        unsafe { rawmouse_free_buffer(buffer) };
    }

    #[test]
    fn test_free_ignores_null_buffer() {
        unsafe { rawmouse_free_buffer(PollBuffer::null()) };
    }

    #[test]
    fn test_empty_poll_is_four_bytes() {
        let buffer = PollBuffer::from_vec(vec![0, 0, 0, 0]);
        assert_eq!(buffer.len, 4);
        assert!(!buffer.ptr.is_null());
        unsafe { rawmouse_free_buffer(buffer) };
    }
}

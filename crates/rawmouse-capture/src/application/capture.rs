//! Capture Thread: pumps source notifications into the aggregator.
//!
//! One [`CaptureSession`] exists per service run. Its thread blocks on the
//! source channel and applies each notification with [`dispatch`]. The
//! thread ends when the channel closes (the source was stopped) or the
//! session is cancelled, and always fires its [`ShutdownSignal`] on the way
//! out, including when it unwinds from a panic.
//!
//! Each session is bound to the aggregator epoch it was spawned for. A thread
//! that outlives its session (for example, blocked in a device query during a
//! restart) finds its epoch superseded and its writes refused.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use super::aggregator::EventAggregator;
use crate::infrastructure::notification_source::{
    CaptureError, Notification, NotificationSource,
};

// ── Completion signal ─────────────────────────────────────────────────────────

/// One-shot flag that threads can wait on.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal and wakes every waiter.
    pub fn notify(&self) {
        *self.fired.lock().expect("lock poisoned") = true;
        self.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.fired.lock().expect("lock poisoned")
    }

    /// Blocks until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut fired = self.fired.lock().expect("lock poisoned");
        while !*fired {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            fired = self
                .cond
                .wait_timeout(fired, deadline - now)
                .expect("lock poisoned")
                .0;
        }
        true
    }
}

/// Fires the completion signal when dropped.
struct CompletionGuard(Arc<ShutdownSignal>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.notify();
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Handle to one running capture thread.
///
/// The thread is detached: dropping the session neither cancels nor joins it.
/// Use [`cancel`](Self::cancel) and [`finished`](Self::finished) instead.
#[derive(Debug)]
pub struct CaptureSession {
    cancel: Arc<AtomicBool>,
    finished: Arc<ShutdownSignal>,
    processed: Arc<AtomicU64>,
}

impl CaptureSession {
    /// Spawns the capture thread over `notifications`, writing into
    /// `aggregator` only while its epoch is still `epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::ThreadSpawn`] if the OS refuses the thread.
    pub fn spawn(
        source: Arc<dyn NotificationSource>,
        aggregator: Arc<EventAggregator>,
        epoch: u64,
        notifications: Receiver<Notification>,
    ) -> Result<Self, CaptureError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(ShutdownSignal::new());
        let processed = Arc::new(AtomicU64::new(0));

        let thread_cancel = Arc::clone(&cancel);
        let guard = CompletionGuard(Arc::clone(&finished));
        let thread_processed = Arc::clone(&processed);

        thread::Builder::new()
            .name("rawmouse-capture".to_string())
            .spawn(move || {
                let _guard = guard;
                info!(epoch, "capture thread started");
                for notification in notifications.iter() {
                    if thread_cancel.load(Ordering::Acquire) {
                        break;
                    }
                    if !dispatch(source.as_ref(), &aggregator, epoch, notification) {
                        debug!(epoch, "aggregator epoch superseded; capture thread exiting");
                        break;
                    }
                    thread_processed.fetch_add(1, Ordering::Relaxed);
                }
                info!("capture thread finished");
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        Ok(Self {
            cancel,
            finished,
            processed,
        })
    }

    /// Tells the thread to stop at the next notification. Does not wait.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Signal fired when the thread has exited.
    pub fn finished(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.finished)
    }

    /// Number of notifications applied so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

/// Applies one notification to the aggregator on behalf of the session bound
/// to `epoch`.
///
/// Arrivals whose metadata query fails are ignored. A sample produces one
/// button event per set edge bit, then one movement update, all in one
/// critical section. The metadata query runs before the lock is taken.
///
/// Returns `false` if `epoch` has been superseded; nothing was written.
pub fn dispatch(
    source: &dyn NotificationSource,
    aggregator: &EventAggregator,
    epoch: u64,
    notification: Notification,
) -> bool {
    match notification {
        Notification::DeviceArrived(device) => {
            let info = match source.device_info(device) {
                Ok(info) => info,
                Err(e) => {
                    debug!(%device, "ignoring device arrival: {e}");
                    return aggregator.epoch() == epoch;
                }
            };
            match aggregator.writer(epoch) {
                Some(mut writer) => writer.on_device_connect(device, info),
                None => return false,
            }
        }
        Notification::DeviceRemoved(device) => match aggregator.writer(epoch) {
            Some(mut writer) => writer.on_device_disconnect(device),
            None => return false,
        },
        Notification::Sample(sample) => {
            trace!(?sample, "applying sample");
            let Some(mut writer) = aggregator.writer(epoch) else {
                return false;
            };
            for edge in sample.button_flags.edges() {
                writer.apply_button_edge(sample.device, edge);
            }
            writer.apply_movement(sample.device, sample.dx, sample.dy, sample.wheel);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::notification_source::{
        mock::MockSource, MockNotificationSource, RawMouseSample, SourceError,
    };
    use mockall::predicate::eq;
    use rawmouse_core::{ButtonFlags, DeviceId, DeviceInfo, EventKind};

    fn sample(device: i32, dx: i32, dy: i32, wheel: i32, flags: u16) -> Notification {
        Notification::Sample(RawMouseSample {
            device: DeviceId(device),
            dx,
            dy,
            wheel,
            button_flags: ButtonFlags(flags),
        })
    }

    #[test]
    fn test_arrival_with_failed_query_adds_nothing() {
        // Arrange
        let mut source = MockNotificationSource::new();
        source
            .expect_device_info()
            .with(eq(DeviceId(5)))
            .times(1)
            .returning(|device| Err(SourceError::DeviceQuery { device, code: 1167 }));
        let agg = EventAggregator::new();

        // Act
        dispatch(&source, &agg, 0, Notification::DeviceArrived(DeviceId(5)));

        // Assert
        assert_eq!(agg.device_count(), 0);
        assert!(agg.drain_all().is_empty());
    }

    #[test]
    fn test_arrival_with_metadata_connects_device() {
        // Arrange
        let mut source = MockNotificationSource::new();
        source.expect_device_info().times(1).returning(|_| {
            Ok(DeviceInfo {
                name: r"\\?\HID#VID_046D&PID_C077".to_string(),
                button_count: 3,
                sample_rate: 125,
                has_horizontal_wheel: false,
            })
        });
        let agg = EventAggregator::new();

        // Act
        dispatch(&source, &agg, 0, Notification::DeviceArrived(DeviceId(5)));

        // Assert
        let devices = agg.devices();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].1.info.button_count, 3);
        assert_eq!(agg.drain_all().events[0].kind, EventKind::Connect);
    }

    #[test]
    fn test_sample_edges_are_applied_in_fixed_order_before_motion() {
        // Arrange
        let source = MockNotificationSource::new();
        let agg = EventAggregator::new();
        agg.on_device_connect(DeviceId(1), DeviceInfo::named("m"));
        agg.drain_all();

        // Act: right down, middle up, left down in one sample
        dispatch(&source, &agg, 0, sample(1, 2, 3, 0, 0x0004 | 0x0020 | 0x0001));
        let snapshot = agg.drain_all();

        // Assert
        let pairs: Vec<(u8, u8)> = snapshot
            .events
            .iter()
            .map(|e| (e.pressed, e.released))
            .collect();
        assert_eq!(pairs, vec![(1, 0), (0, 3), (2, 0)]);
        assert_eq!((snapshot.movements[0].x, snapshot.movements[0].y), (2, 3));
    }

    #[test]
    fn test_zero_sample_is_harmless() {
        let source = MockNotificationSource::new();
        let agg = EventAggregator::new();
        agg.on_device_connect(DeviceId(1), DeviceInfo::named("m"));
        agg.drain_all();

        dispatch(&source, &agg, 0, sample(1, 0, 0, 0, 0));

        assert!(agg.drain_all().is_empty());
    }

    #[test]
    fn test_removal_disconnects_without_query() {
        let source = MockNotificationSource::new();
        let agg = EventAggregator::new();
        agg.on_device_connect(DeviceId(1), DeviceInfo::named("m"));

        dispatch(&source, &agg, 0, Notification::DeviceRemoved(DeviceId(1)));

        assert_eq!(agg.device_count(), 0);
        assert_eq!(agg.drain_all().events.last().unwrap().kind, EventKind::Disconnect);
    }

    #[test]
    fn test_shutdown_signal_wait_times_out_then_succeeds() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait(Duration::from_millis(10)));
        signal.notify();
        assert!(signal.is_set());
        assert!(signal.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_session_finishes_when_channel_closes() {
        // Arrange
        let source = Arc::new(MockSource::new());
        let agg = Arc::new(EventAggregator::new());
        let rx = source.start().expect("start should succeed");
        let session =
            CaptureSession::spawn(source.clone(), agg.clone(), agg.epoch(), rx).expect("spawn");

        // Act
        source.connect(DeviceId(1), "TestMouse");
        source.stop();

        // Assert
        assert!(session.finished().wait(Duration::from_secs(5)));
        assert_eq!(session.processed(), 1);
        assert_eq!(agg.device_count(), 1);
    }

    #[test]
    fn test_cancelled_session_stops_applying_notifications() {
        // Arrange
        let source = Arc::new(MockSource::new());
        let agg = Arc::new(EventAggregator::new());
        let rx = source.start().expect("start should succeed");
        let session =
            CaptureSession::spawn(source.clone(), agg.clone(), agg.epoch(), rx).expect("spawn");

        // Act
        session.cancel();
        source.connect(DeviceId(1), "TestMouse");

        // Assert
        assert!(session.finished().wait(Duration::from_secs(5)));
        assert!(session.is_cancelled());
        assert_eq!(agg.device_count(), 0);
        source.stop();
    }

    #[test]
    fn test_dispatch_for_superseded_epoch_writes_nothing() {
        // Arrange
        let mut source = MockNotificationSource::new();
        source.expect_device_info().returning(|_| Ok(DeviceInfo::named("late")));
        let agg = EventAggregator::new();
        let stale = agg.epoch();
        agg.reset();

        // Act
        let arrived = dispatch(&source, &agg, stale, Notification::DeviceArrived(DeviceId(42)));
        let moved = dispatch(&source, &agg, stale, sample(42, 1, 1, 0, 0x0001));

        // Assert
        assert!(!arrived);
        assert!(!moved);
        assert_eq!(agg.device_count(), 0);
        assert!(agg.drain_all().is_empty());
    }

    #[test]
    fn test_arrival_resolved_after_reset_is_dropped() {
        // Arrange: the reset lands while the metadata query is in flight
        let agg = Arc::new(EventAggregator::new());
        let epoch = agg.epoch();
        let mut source = MockNotificationSource::new();
        let during_query = Arc::clone(&agg);
        source.expect_device_info().times(1).returning(move |_| {
            during_query.reset();
            Ok(DeviceInfo::named("slow"))
        });

        // Act
        let applied = dispatch(&source, &agg, epoch, Notification::DeviceArrived(DeviceId(42)));

        // Assert
        assert!(!applied);
        assert_eq!(agg.device_count(), 0);
        assert_eq!(agg.pending_event_count(), 0);
    }

    #[test]
    fn test_session_exits_once_its_epoch_is_superseded() {
        // Arrange
        let source = Arc::new(MockSource::new());
        let agg = Arc::new(EventAggregator::new());
        let rx = source.start().expect("start should succeed");
        let session =
            CaptureSession::spawn(source.clone(), agg.clone(), agg.epoch(), rx).expect("spawn");

        // Act
        agg.reset();
        source.connect(DeviceId(1), "TestMouse");

        // Assert
        assert!(session.finished().wait(Duration::from_secs(5)));
        assert_eq!(session.processed(), 0);
        assert_eq!(agg.device_count(), 0);
        source.stop();
    }
}

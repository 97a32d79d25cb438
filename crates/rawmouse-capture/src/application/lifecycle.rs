//! Service Lifecycle Controller.
//!
//! [`CaptureService`] owns the aggregator, the notification source and the
//! current capture session, and exposes the three operations the host sees:
//! `init`, `kill` and `poll`.
//!
//! ```text
//!  Uninitialized ──init──► Running ──kill──► Stopped
//!                            ▲                  │
//!                            └──────init────────┘
//! ```
//!
//! `kill` never blocks. `init` on a running service performs a full `kill`
//! first and then waits, bounded by the configured timeout, for the old
//! capture thread to exit before clearing state and starting over.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rawmouse_core::{encode_snapshot, DeviceId, Snapshot};
use tracing::{error, info, warn};

use super::aggregator::{DeviceState, EventAggregator};
use super::capture::{CaptureSession, ShutdownSignal};
use crate::infrastructure::notification_source::{CaptureError, NotificationSource};

/// Where the service is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Running,
    Stopped,
}

/// Result of a successful `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The service was not running.
    Fresh,
    /// A running session was killed and replaced.
    Restarted,
}

/// Result of `kill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillReport {
    pub was_running: bool,
    /// OS status from the source's stop request; 0 when none was recorded.
    pub os_status: u32,
}

struct ServiceInner {
    state: ServiceState,
    session: Option<CaptureSession>,
}

/// Background mouse capture service.
pub struct CaptureService {
    source: Arc<dyn NotificationSource>,
    aggregator: Arc<EventAggregator>,
    inner: Mutex<ServiceInner>,
    shutdown_timeout: Duration,
}

impl CaptureService {
    pub fn new(source: Arc<dyn NotificationSource>, shutdown_timeout: Duration) -> Self {
        Self {
            source,
            aggregator: Arc::new(EventAggregator::new()),
            inner: Mutex::new(ServiceInner {
                state: ServiceState::Uninitialized,
                session: None,
            }),
            shutdown_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceInner> {
        self.inner.lock().expect("service lock poisoned")
    }

    /// Starts capturing, restarting if already running.
    ///
    /// # Errors
    ///
    /// Returns the source's [`CaptureError`] if it fails to start or the
    /// capture thread cannot be spawned. The service is then Stopped.
    pub fn init(&self) -> Result<InitOutcome, CaptureError> {
        let mut inner = self.lock();

        let outcome = if inner.state == ServiceState::Running {
            Self::kill_locked(&mut inner, self.source.as_ref());
            InitOutcome::Restarted
        } else {
            InitOutcome::Fresh
        };

        if let Some(previous) = inner.session.take() {
            if !previous.finished().wait(self.shutdown_timeout) {
                warn!(
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "previous capture thread did not finish in time; it stays cancelled"
                );
            }
        }

        let epoch = self.aggregator.reset();

        let notifications = match self.source.start() {
            Ok(rx) => rx,
            Err(e) => {
                error!("notification source failed to start: {e}");
                inner.state = ServiceState::Stopped;
                return Err(e);
            }
        };

        match CaptureSession::spawn(
            Arc::clone(&self.source),
            Arc::clone(&self.aggregator),
            epoch,
            notifications,
        ) {
            Ok(session) => inner.session = Some(session),
            Err(e) => {
                error!("capture thread failed to start: {e}");
                self.source.stop();
                inner.state = ServiceState::Stopped;
                return Err(e);
            }
        }

        inner.state = ServiceState::Running;
        info!(?outcome, "capture service running");
        Ok(outcome)
    }

    /// Stops capturing without waiting for the capture thread.
    pub fn kill(&self) -> KillReport {
        let mut inner = self.lock();
        if inner.state != ServiceState::Running {
            return KillReport {
                was_running: false,
                os_status: 0,
            };
        }
        let os_status = Self::kill_locked(&mut inner, self.source.as_ref());
        info!(os_status, "capture service stopped");
        KillReport {
            was_running: true,
            os_status,
        }
    }

    fn kill_locked(inner: &mut ServiceInner, source: &dyn NotificationSource) -> u32 {
        if let Some(session) = inner.session.as_ref() {
            session.cancel();
        }
        inner.state = ServiceState::Stopped;
        source.stop()
    }

    /// Drains everything accumulated since the previous poll.
    pub fn poll(&self) -> Snapshot {
        self.aggregator.drain_all()
    }

    /// Drains and serializes in the poll wire format.
    pub fn poll_bytes(&self) -> Vec<u8> {
        encode_snapshot(&self.poll())
    }

    /// Waits for the current (or last) capture thread to exit.
    ///
    /// Returns `true` immediately if no session was ever started.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let signal: Option<Arc<ShutdownSignal>> =
            self.lock().session.as_ref().map(CaptureSession::finished);
        match signal {
            Some(signal) => signal.wait(timeout),
            None => true,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.lock().state
    }

    /// Notifications applied by the current session.
    pub fn processed_notifications(&self) -> u64 {
        self.lock()
            .session
            .as_ref()
            .map_or(0, CaptureSession::processed)
    }

    pub fn devices(&self) -> Vec<(DeviceId, DeviceState)> {
        self.aggregator.devices()
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.kill();
    }
}

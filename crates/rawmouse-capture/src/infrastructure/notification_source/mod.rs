//! Device notification sources.
//!
//! On Windows, [`windows::WindowsRawInputSource`] registers for Raw Input
//! mouse notifications on a hidden message-only window owned by a dedicated
//! message-loop thread. Each `WM_INPUT` / `WM_INPUT_DEVICE_CHANGE` message
//! is decoded on that thread and forwarded as a [`Notification`] over a
//! `std::sync::mpsc` channel.
//!
//! # Why decode on the OS thread?
//!
//! The payload behind a `WM_INPUT` handle is only readable while the message
//! is being dispatched. The window procedure therefore copies the few fields
//! the aggregator needs into a [`RawMouseSample`] and lets the capture thread
//! do the rest.
//!
//! # Testability
//!
//! The [`NotificationSource`] trait lets tests drive the capture thread with
//! [`mock::MockSource`] and no OS involvement.

use std::sync::{mpsc, Arc};

use rawmouse_core::{ButtonFlags, DeviceId, DeviceInfo};
use thiserror::Error;

use crate::infrastructure::storage::config::CaptureConfig;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

/// One raw mouse report, copied out of the OS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMouseSample {
    pub device: DeviceId,
    /// Relative X movement.
    pub dx: i32,
    /// Relative Y movement.
    pub dy: i32,
    /// Signed vertical wheel delta; 0 unless [`ButtonFlags::WHEEL`] is set.
    pub wheel: i32,
    pub button_flags: ButtonFlags,
}

/// A notification produced by a [`NotificationSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A device appeared. Its metadata is queried with
    /// [`NotificationSource::device_info`].
    DeviceArrived(DeviceId),
    DeviceRemoved(DeviceId),
    Sample(RawMouseSample),
}

/// Error type for starting a notification source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("notification source is already running")]
    AlreadyRunning,
    #[error("failed to create capture window: {0}")]
    WindowSetup(String),
    #[error("failed to register for raw input: {0}")]
    Registration(String),
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Error type for per-device metadata queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("device query failed for {device} (os error {code})")]
    DeviceQuery { device: DeviceId, code: u32 },
}

/// Trait abstracting the OS mechanism that delivers raw mouse input.
///
/// The production implementation uses Windows Raw Input; tests use
/// [`mock::MockSource`] or the generated `MockNotificationSource`.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSource: Send + Sync {
    /// Starts the source and returns a receiver for its notifications.
    ///
    /// The channel closes when the source is stopped.
    fn start(&self) -> Result<mpsc::Receiver<Notification>, CaptureError>;

    /// Requests the source to stop and release its OS registration.
    ///
    /// Does not wait for the OS thread to exit. Returns the OS error code
    /// observed while posting the request (0 when none).
    fn stop(&self) -> u32;

    /// Queries metadata for a device that just arrived.
    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, SourceError>;
}

// ── Unsupported platforms ─────────────────────────────────────────────────────

/// Source used where no Raw Input mechanism exists. Never starts.
#[derive(Debug, Default)]
pub struct UnsupportedSource;

impl NotificationSource for UnsupportedSource {
    fn start(&self) -> Result<mpsc::Receiver<Notification>, CaptureError> {
        Err(CaptureError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }

    fn stop(&self) -> u32 {
        0
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, SourceError> {
        Err(SourceError::DeviceQuery { device, code: 0 })
    }
}

/// Builds the live notification source for the current platform.
pub fn platform_source(config: &CaptureConfig) -> Arc<dyn NotificationSource> {
    #[cfg(target_os = "windows")]
    {
        Arc::new(windows::WindowsRawInputSource::new(config.clone()))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let _ = config;
        Arc::new(UnsupportedSource)
    }
}

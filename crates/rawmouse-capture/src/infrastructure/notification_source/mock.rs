//! Channel-backed notification source for tests.
//!
//! Lets tests inject synthetic device arrivals, removals and samples without
//! a running Windows message loop.

use std::collections::HashMap;
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use rawmouse_core::{ButtonFlags, DeviceId, DeviceInfo};

use super::{CaptureError, Notification, NotificationSource, RawMouseSample, SourceError};

/// A [`NotificationSource`] whose notifications come from the test.
///
/// Devices that should answer [`NotificationSource::device_info`] must be
/// registered with [`register_device`] first; an unregistered arrival models
/// a failed OS query.
///
/// [`register_device`]: MockSource::register_device
pub struct MockSource {
    sender: Mutex<Option<Sender<Notification>>>,
    devices: Mutex<HashMap<DeviceId, DeviceInfo>>,
    stop_status: Mutex<u32>,
    start_count: Mutex<u32>,
    query_delay: Mutex<Duration>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            devices: Mutex::new(HashMap::new()),
            stop_status: Mutex::new(0),
            start_count: Mutex::new(0),
            query_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Makes `device` answer metadata queries with `info`.
    pub fn register_device(&self, device: DeviceId, info: DeviceInfo) {
        self.devices
            .lock()
            .expect("lock poisoned")
            .insert(device, info);
    }

    /// Sets the status returned by the next [`NotificationSource::stop`] calls.
    pub fn set_stop_status(&self, status: u32) {
        *self.stop_status.lock().expect("lock poisoned") = status;
    }

    /// Makes every metadata query block for `delay` before answering, like a
    /// slow driver.
    pub fn set_query_delay(&self, delay: Duration) {
        *self.query_delay.lock().expect("lock poisoned") = delay;
    }

    /// Injects a notification, as if delivered by the OS.
    ///
    /// Returns `false` if the source is not started or the receiver is gone.
    pub fn inject(&self, notification: Notification) -> bool {
        let guard = self.sender.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(sender) => sender.send(notification).is_ok(),
            None => false,
        }
    }

    /// Registers `name` for `device` and injects its arrival.
    pub fn connect(&self, device: DeviceId, name: &str) -> bool {
        self.register_device(device, DeviceInfo::named(name));
        self.inject(Notification::DeviceArrived(device))
    }

    pub fn disconnect(&self, device: DeviceId) -> bool {
        self.inject(Notification::DeviceRemoved(device))
    }

    /// Injects a pure movement sample.
    pub fn move_by(&self, device: DeviceId, dx: i32, dy: i32) -> bool {
        self.inject(Notification::Sample(RawMouseSample {
            device,
            dx,
            dy,
            wheel: 0,
            button_flags: ButtonFlags::default(),
        }))
    }

    /// Injects a wheel-only sample.
    pub fn scroll(&self, device: DeviceId, delta: i32) -> bool {
        self.inject(Notification::Sample(RawMouseSample {
            device,
            dx: 0,
            dy: 0,
            wheel: delta,
            button_flags: ButtonFlags(ButtonFlags::WHEEL),
        }))
    }

    /// Injects a motionless sample carrying `flags`.
    pub fn buttons(&self, device: DeviceId, flags: u16) -> bool {
        self.inject(Notification::Sample(RawMouseSample {
            device,
            dx: 0,
            dy: 0,
            wheel: 0,
            button_flags: ButtonFlags(flags),
        }))
    }

    /// `true` between `start()` and `stop()`.
    pub fn is_started(&self) -> bool {
        self.sender.lock().expect("lock poisoned").is_some()
    }

    /// Number of times `start()` has been called.
    pub fn start_count(&self) -> u32 {
        *self.start_count.lock().expect("lock poisoned")
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSource for MockSource {
    fn start(&self) -> Result<mpsc::Receiver<Notification>, CaptureError> {
        let mut sender = self.sender.lock().expect("lock poisoned");
        if sender.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        let (tx, rx) = mpsc::channel();
        *sender = Some(tx);
        *self.start_count.lock().expect("lock poisoned") += 1;
        Ok(rx)
    }

    fn stop(&self) -> u32 {
        // Dropping the sender closes the channel.
        *self.sender.lock().expect("lock poisoned") = None;
        *self.stop_status.lock().expect("lock poisoned")
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, SourceError> {
        let delay = *self.query_delay.lock().expect("lock poisoned");
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.devices
            .lock()
            .expect("lock poisoned")
            .get(&device)
            .cloned()
            .ok_or(SourceError::DeviceQuery { device, code: 1167 })
    }
}

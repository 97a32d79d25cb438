//! Event Aggregator: per-device accumulators and the discrete event queue.
//!
//! The capture thread is the only writer of movement; the poller is the only
//! drainer. Both touch the device table and the queue, so the two live
//! behind one mutex and every operation is a single short critical section.
//!
//! # Accumulate, then drain (for beginners)
//!
//! A mouse can report a thousand times a second, but a host may poll only
//! sixty times a second. Rather than queueing every report, the aggregator
//! adds each report's deltas to a running total per device. A poll takes
//! those totals and resets them to zero in the same step, so no motion is
//! counted twice and none is lost between polls.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use rawmouse_core::{ButtonEdge, DeviceId, DeviceInfo, DiscreteEvent, MovementSample, Snapshot};
use tracing::{info, trace};

/// Accumulator for one connected device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub x: i32,
    pub y: i32,
    pub wheel: i32,
    pub display_name: String,
    pub info: DeviceInfo,
}

impl DeviceState {
    fn has_motion(&self) -> bool {
        self.x != 0 || self.y != 0 || self.wheel != 0
    }
}

#[derive(Debug, Default)]
struct Shared {
    /// Ordered so that movement records come out in a stable order.
    devices: BTreeMap<DeviceId, DeviceState>,
    events: Vec<DiscreteEvent>,
    /// Bumped by every reset. Writers bound to an older epoch are refused.
    epoch: u64,
}

/// Thread-safe device table plus discrete event queue.
#[derive(Debug, Default)]
pub struct EventAggregator {
    shared: Mutex<Shared>,
}

/// Exclusive write access to the aggregator for one capture session.
///
/// Holds the aggregator lock, so every write made through one writer lands
/// in the same critical section. Obtained from [`EventAggregator::writer`],
/// which refuses writers whose epoch has been superseded by a reset.
pub struct SessionWriter<'a> {
    shared: MutexGuard<'a, Shared>,
}

impl SessionWriter<'_> {
    /// Adds deltas to `device`'s accumulators.
    ///
    /// Movement from a device that is not in the table is dropped.
    pub fn apply_movement(&mut self, device: DeviceId, dx: i32, dy: i32, dwheel: i32) {
        match self.shared.devices.get_mut(&device) {
            Some(state) => {
                state.x = state.x.saturating_add(dx);
                state.y = state.y.saturating_add(dy);
                state.wheel = state.wheel.saturating_add(dwheel);
            }
            None => trace!(%device, "movement from unregistered device dropped"),
        }
    }

    /// Queues one ButtonPress or ButtonRelease event.
    ///
    /// The device does not need to be in the table.
    pub fn apply_button_edge(&mut self, device: DeviceId, edge: ButtonEdge) {
        self.shared.events.push(DiscreteEvent::button(device, edge));
    }

    /// Inserts (or replaces) `device` with zeroed accumulators and queues a
    /// Connect event.
    pub fn on_device_connect(&mut self, device: DeviceId, info: DeviceInfo) {
        info!(%device, name = %info.name, buttons = info.button_count, "device connected");
        self.shared.devices.insert(
            device,
            DeviceState {
                display_name: info.name.clone(),
                info,
                ..DeviceState::default()
            },
        );
        self.shared.events.push(DiscreteEvent::connect(device));
    }

    /// Removes `device`, discarding undrained motion, and queues a
    /// Disconnect event.
    pub fn on_device_disconnect(&mut self, device: DeviceId) {
        info!(%device, "device disconnected");
        self.shared.devices.remove(&device);
        self.shared.events.push(DiscreteEvent::disconnect(device));
    }
}

impl EventAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        // A poisoned lock means a panic mid-update; the state can't be trusted.
        self.shared.lock().expect("aggregator lock poisoned")
    }

    /// Writer for the current epoch, whatever it is.
    fn current(&self) -> SessionWriter<'_> {
        SessionWriter {
            shared: self.lock(),
        }
    }

    /// Current epoch. Starts at 0 and advances on every [`reset`](Self::reset).
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Locks the aggregator for writes on behalf of a session bound to
    /// `epoch`.
    ///
    /// Returns `None` if a reset has happened since that epoch was read. The
    /// check and the writes share one lock, so a reset can never land between
    /// them.
    pub fn writer(&self, epoch: u64) -> Option<SessionWriter<'_>> {
        let shared = self.lock();
        (shared.epoch == epoch).then_some(SessionWriter { shared })
    }

    /// Adds deltas to `device`'s accumulators.
    ///
    /// Movement from a device that is not in the table is dropped.
    pub fn apply_movement(&self, device: DeviceId, dx: i32, dy: i32, dwheel: i32) {
        self.current().apply_movement(device, dx, dy, dwheel);
    }

    /// Queues one ButtonPress or ButtonRelease event.
    pub fn apply_button_edge(&self, device: DeviceId, edge: ButtonEdge) {
        self.current().apply_button_edge(device, edge);
    }

    /// Inserts (or replaces) `device` and queues a Connect event.
    pub fn on_device_connect(&self, device: DeviceId, info: DeviceInfo) {
        self.current().on_device_connect(device, info);
    }

    /// Removes `device` and queues a Disconnect event.
    pub fn on_device_disconnect(&self, device: DeviceId) {
        self.current().on_device_disconnect(device);
    }

    /// Takes everything accumulated since the last drain.
    ///
    /// Returns the queued events in arrival order followed by one movement
    /// sample per device with non-zero motion, and zeroes those devices.
    pub fn drain_all(&self) -> Snapshot {
        let mut shared = self.lock();
        let events = std::mem::take(&mut shared.events);
        let movements = shared
            .devices
            .iter_mut()
            .filter(|(_, state)| state.has_motion())
            .map(|(&device, state)| {
                let sample = MovementSample {
                    device,
                    x: state.x,
                    y: state.y,
                    wheel: state.wheel,
                };
                state.x = 0;
                state.y = 0;
                state.wheel = 0;
                sample
            })
            .collect();
        Snapshot { events, movements }
    }

    /// Forgets every device and queued event and starts a new epoch.
    ///
    /// Returns the new epoch.
    pub fn reset(&self) -> u64 {
        let mut shared = self.lock();
        shared.devices.clear();
        shared.events.clear();
        shared.epoch = shared.epoch.wrapping_add(1);
        shared.epoch
    }

    pub fn device_count(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn pending_event_count(&self) -> usize {
        self.lock().events.len()
    }

    /// Copies the device table.
    pub fn devices(&self) -> Vec<(DeviceId, DeviceState)> {
        self.lock()
            .devices
            .iter()
            .map(|(&id, state)| (id, state.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rawmouse_core::EventKind;

    fn connected(ids: &[i32]) -> EventAggregator {
        let agg = EventAggregator::new();
        for &id in ids {
            agg.on_device_connect(DeviceId(id), DeviceInfo::named(format!("mouse-{id}")));
        }
        agg.drain_all();
        agg
    }

    #[test]
    fn test_movement_sums_exactly_and_resets_after_drain() {
        // Arrange
        let agg = connected(&[1]);

        // Act
        agg.apply_movement(DeviceId(1), 3, -1, 0);
        agg.apply_movement(DeviceId(1), 4, -2, 120);
        agg.apply_movement(DeviceId(1), -2, 0, -240);
        let snapshot = agg.drain_all();

        // Assert
        assert_eq!(
            snapshot.movements,
            vec![MovementSample {
                device: DeviceId(1),
                x: 5,
                y: -3,
                wheel: -120
            }]
        );
        let (_, state) = &agg.devices()[0];
        assert_eq!((state.x, state.y, state.wheel), (0, 0, 0));
    }

    #[test]
    fn test_zero_net_movement_produces_no_record() {
        let agg = connected(&[1]);
        agg.apply_movement(DeviceId(1), 5, 5, 0);
        agg.apply_movement(DeviceId(1), -5, -5, 0);
        assert!(agg.drain_all().is_empty());
    }

    #[test]
    fn test_second_drain_is_empty() {
        let agg = connected(&[1]);
        agg.apply_movement(DeviceId(1), 1, 0, 0);
        agg.apply_button_edge(DeviceId(1), ButtonEdge::Pressed(1));

        assert_eq!(agg.drain_all().len(), 2);
        assert!(agg.drain_all().is_empty());
    }

    #[test]
    fn test_events_drain_in_append_order() {
        // Arrange
        let agg = EventAggregator::new();

        // Act
        agg.on_device_connect(DeviceId(7), DeviceInfo::named("a"));
        agg.apply_button_edge(DeviceId(7), ButtonEdge::Pressed(2));
        agg.apply_button_edge(DeviceId(7), ButtonEdge::Released(2));
        agg.on_device_disconnect(DeviceId(7));
        let snapshot = agg.drain_all();

        // Assert
        let kinds: Vec<EventKind> = snapshot.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Connect,
                EventKind::ButtonPress,
                EventKind::ButtonRelease,
                EventKind::Disconnect
            ]
        );
        assert_eq!(agg.pending_event_count(), 0);
    }

    #[test]
    fn test_movement_after_disconnect_is_ignored() {
        let agg = connected(&[4]);
        agg.on_device_disconnect(DeviceId(4));
        agg.apply_movement(DeviceId(4), 10, 10, 0);

        let snapshot = agg.drain_all();

        assert!(snapshot.movements.is_empty());
        assert_eq!(agg.device_count(), 0);
    }

    #[test]
    fn test_button_edge_from_unknown_device_is_still_queued() {
        let agg = EventAggregator::new();
        agg.apply_button_edge(DeviceId(99), ButtonEdge::Released(3));
        let snapshot = agg.drain_all();
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].released, 3);
    }

    #[test]
    fn test_reconnect_resets_accumulators_and_name() {
        // Arrange
        let agg = connected(&[2]);
        agg.apply_movement(DeviceId(2), 8, 8, 0);

        // Act
        agg.on_device_connect(DeviceId(2), DeviceInfo::named("replacement"));
        let snapshot = agg.drain_all();

        // Assert
        assert!(snapshot.movements.is_empty());
        assert_eq!(agg.devices()[0].1.display_name, "replacement");
    }

    #[test]
    fn test_movement_records_follow_device_order() {
        let agg = connected(&[30, -4, 12]);
        agg.apply_movement(DeviceId(12), 1, 0, 0);
        agg.apply_movement(DeviceId(30), 1, 0, 0);
        agg.apply_movement(DeviceId(-4), 1, 0, 0);

        let order: Vec<DeviceId> = agg
            .drain_all()
            .movements
            .iter()
            .map(|m| m.device)
            .collect();

        assert_eq!(order, vec![DeviceId(-4), DeviceId(12), DeviceId(30)]);
    }

    #[test]
    fn test_accumulators_saturate_instead_of_wrapping() {
        let agg = connected(&[1]);
        agg.apply_movement(DeviceId(1), i32::MAX, 0, 0);
        agg.apply_movement(DeviceId(1), 10, 0, 0);
        assert_eq!(agg.drain_all().movements[0].x, i32::MAX);
    }

    #[test]
    fn test_reset_clears_devices_and_queue() {
        let agg = EventAggregator::new();
        agg.on_device_connect(DeviceId(1), DeviceInfo::named("a"));
        agg.reset();
        assert_eq!(agg.device_count(), 0);
        assert_eq!(agg.pending_event_count(), 0);
    }

    #[test]
    fn test_reset_advances_epoch() {
        let agg = EventAggregator::new();
        assert_eq!(agg.epoch(), 0);
        assert_eq!(agg.reset(), 1);
        assert_eq!(agg.epoch(), 1);
    }

    #[test]
    fn test_writer_for_current_epoch_applies_changes() {
        // Arrange
        let agg = EventAggregator::new();
        let epoch = agg.reset();

        // Act
        {
            let mut writer = agg.writer(epoch).expect("current epoch");
            writer.on_device_connect(DeviceId(3), DeviceInfo::named("m"));
            writer.apply_movement(DeviceId(3), 4, 0, 0);
        }
        let snapshot = agg.drain_all();

        // Assert
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.movements[0].x, 4);
    }

    #[test]
    fn test_writer_for_superseded_epoch_is_refused() {
        // Arrange
        let agg = EventAggregator::new();
        let stale = agg.epoch();

        // Act
        agg.reset();

        // Assert
        assert!(agg.writer(stale).is_none());
        assert_eq!(agg.device_count(), 0);
        assert_eq!(agg.pending_event_count(), 0);
    }
}

//! Device identity and metadata.

use std::fmt;

/// Opaque handle identifying one physical device for the lifetime of its
/// connection.
///
/// On Windows this is the Raw Input device handle truncated to 32 bits, which
/// is the width used on the wire. The OS may hand the same value to a
/// different device after a disconnect; that is treated as a new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub i32);

impl DeviceId {
    /// Returns the raw wire value.
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl From<i32> for DeviceId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata reported by the OS when a device connects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Interface path of the device. Best effort; may be empty.
    pub name: String,
    /// Number of buttons the device reports.
    pub button_count: u32,
    /// Reports per second, or 0 when the driver does not say.
    pub sample_rate: u32,
    pub has_horizontal_wheel: bool,
}

impl DeviceInfo {
    /// Builds an info record carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_ids_order_by_raw_value() {
        let mut ids = vec![DeviceId(7), DeviceId(-3), DeviceId(2)];
        ids.sort();
        assert_eq!(ids, vec![DeviceId(-3), DeviceId(2), DeviceId(7)]);
    }

    #[test]
    fn test_device_id_displays_raw_value() {
        assert_eq!(DeviceId(-42).to_string(), "-42");
        assert_eq!(DeviceId::from(65_601).raw(), 65_601);
    }

    #[test]
    fn test_named_info_leaves_capabilities_zeroed() {
        let info = DeviceInfo::named("TestMouse");
        assert_eq!(info.name, "TestMouse");
        assert_eq!(info.button_count, 0);
        assert_eq!(info.sample_rate, 0);
        assert!(!info.has_horizontal_wheel);
    }
}

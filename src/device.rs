//! Observed BLE device state.
//!
//! A [`DeviceRecord`] is an immutable snapshot of one device at the moment of
//! its latest advertisement. Records are replaced wholesale on every new
//! sighting, never mutated in place; consumers only ever hold clones.

use crate::address::BleAddress;
use std::fmt;
use std::time::Instant;

/// Connection and pairing state resolved from per-device metadata.
///
/// Only populated on the extended record path, where a
/// [`DeviceInfoResolver`](crate::source::DeviceInfoResolver) is configured.
/// Broadcast-only deployments leave it absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairingState {
    /// Whether a connection to the device is currently established.
    pub connected: bool,
    /// Whether the device can be paired with.
    pub pairable: bool,
    /// Whether the device is currently paired.
    pub paired: bool,
}

/// A snapshot of one device's observed state.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Radio address of the device, the identity the registry keys by.
    pub address: BleAddress,
    /// Display name, if the device has advertised one.
    pub name: Option<String>,
    /// Latest observed signal strength in dBm.
    pub rssi: i16,
    /// Timestamp of the advertisement that produced this record.
    pub last_seen: Instant,
    /// Connection/pairing state, present only on the extended record path.
    pub pairing: Option<PairingState>,
}

impl DeviceRecord {
    /// The device name, treating an empty string the same as no name at all.
    ///
    /// Broadcasts frequently omit the name after the first advertisement, so
    /// "blank" and "absent" are equivalent for change detection.
    pub fn known_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({} dBm)",
            self.known_name().unwrap_or("[no name]"),
            self.address,
            self.rssi
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_ADDRESS, record};

    #[test]
    fn test_known_name_absent() {
        let rec = record(TEST_ADDRESS, None, Instant::now());
        assert_eq!(rec.known_name(), None);
    }

    #[test]
    fn test_known_name_blank_is_absent() {
        let rec = record(TEST_ADDRESS, Some(""), Instant::now());
        assert_eq!(rec.known_name(), None);
    }

    #[test]
    fn test_known_name_present() {
        let rec = record(TEST_ADDRESS, Some("Thermostat"), Instant::now());
        assert_eq!(rec.known_name(), Some("Thermostat"));
    }

    #[test]
    fn test_display_with_name() {
        let mut rec = record(TEST_ADDRESS, Some("Thermostat"), Instant::now());
        rec.rssi = -42;
        assert_eq!(format!("{}", rec), "Thermostat [AA:BB:CC:DD:EE:FF] (-42 dBm)");
    }

    #[test]
    fn test_display_without_name() {
        let mut rec = record(TEST_ADDRESS, None, Instant::now());
        rec.rssi = -70;
        assert_eq!(format!("{}", rec), "[no name] [AA:BB:CC:DD:EE:FF] (-70 dBm)");
    }
}

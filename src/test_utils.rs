use crate::address::BleAddress;
use crate::device::DeviceRecord;
use crate::source::Advertisement;
use std::time::Instant;

/// A stable radio address for unit tests.
pub const TEST_ADDRESS: BleAddress = BleAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// Build an anonymous `Advertisement` with a neutral signal strength.
///
/// Tests can override just the fields they care about.
pub fn advertisement(address: BleAddress, timestamp: Instant) -> Advertisement {
    Advertisement {
        address,
        local_name: None,
        rssi: -50,
        timestamp,
    }
}

/// Build a broadcast-only `DeviceRecord`.
pub fn record(address: BleAddress, name: Option<&str>, last_seen: Instant) -> DeviceRecord {
    DeviceRecord {
        address,
        name: name.map(str::to_string),
        rssi: -50,
        last_seen,
        pairing: None,
    }
}

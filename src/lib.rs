//! `ble-watcher` library.
//!
//! Tracks nearby Bluetooth LE devices by listening to their advertisement
//! broadcasts: per-device state is aggregated into a live registry, silent
//! devices are expired after a heartbeat timeout, and every change is
//! republished to subscribers as a classified notification.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing and process exit
//! codes. The core logic lives in [`crate::watcher`] and [`crate::registry`]
//! where it can be tested deterministically with injected sources and
//! resolvers.

pub mod address;
pub mod classify;
pub mod device;
pub mod registry;
pub mod source;
pub mod watcher;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use address::BleAddress;
pub use classify::{build_record, classify};
pub use device::{DeviceRecord, PairingState};
pub use registry::{
    DEFAULT_HEARTBEAT_TIMEOUT, DeviceRegistry, SweptSnapshot, UpsertOutcome, parse_duration,
};
pub use source::{
    Advertisement, AdvertisementSource, DeviceInfoResolver, ExtendedDeviceInfo, SourceError,
};
#[cfg(feature = "bluer")]
pub use source::bluer::{BluerResolver, BluerSource};
pub use watcher::{AdvertisementWatcher, BuildError, WatcherError, WatcherEvent};

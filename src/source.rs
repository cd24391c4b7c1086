//! Advertisement source abstraction.
//!
//! This module defines the contract between the watcher core and the external
//! radio subsystem: a stream of raw [`Advertisement`] events plus an optional
//! per-device metadata lookup. Trait-based so the core can be driven by fake
//! sources in tests without Bluetooth hardware.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::address::BleAddress;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;

/// Channel buffer size for inbound advertisement events.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// A raw advertisement broadcast received from a nearby device.
#[derive(Debug, Clone, PartialEq)]
pub struct Advertisement {
    /// Radio address of the broadcasting device.
    pub address: BleAddress,
    /// Local name carried in the advertisement payload, if any.
    pub local_name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// When the broadcast was received.
    pub timestamp: Instant,
}

/// Richer device metadata resolved out-of-band for one address.
///
/// Resolution is best-effort: the lookup collaborator may fail or return
/// nothing, in which case the triggering advertisement is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedDeviceInfo {
    /// Platform-resolved device name; preferred over the advertised one.
    pub name: Option<String>,
    /// Whether a connection to the device is established.
    pub connected: bool,
    /// Whether the device can be paired with.
    pub pairable: bool,
    /// Whether the device is currently paired.
    pub paired: bool,
}

/// Error type for source operations.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// Source of raw advertisement events.
///
/// `subscribe` activates the underlying radio listener and returns the event
/// channel. The source stops delivering when the receiver is dropped; the
/// channel closing on its own signals that the source failed mid-session.
pub trait AdvertisementSource: Send + Sync {
    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, SourceError>> + Send + '_>>;
}

/// Per-address lookup of extended device metadata.
///
/// Lookups for different advertisements may run concurrently; a `None` result
/// means the metadata was unavailable and the event should be discarded.
pub trait DeviceInfoResolver: Send + Sync {
    fn resolve(
        &self,
        address: BleAddress,
    ) -> Pin<Box<dyn Future<Output = Option<ExtendedDeviceInfo>> + Send + '_>>;
}

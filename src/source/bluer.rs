//! BlueZ D-Bus backend.
//!
//! Adapts the BlueZ advertisement monitor into the [`AdvertisementSource`]
//! contract and BlueZ device properties into the [`DeviceInfoResolver`]
//! contract. Requires the `bluetoothd` daemon to be running.

use super::{
    ADVERTISEMENT_CHANNEL_BUFFER_SIZE, Advertisement, AdvertisementSource, DeviceInfoResolver,
    ExtendedDeviceInfo, SourceError,
};
use crate::address::BleAddress;
use bluer::monitor::{Monitor, MonitorEvent};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

impl From<bluer::Error> for SourceError {
    fn from(err: bluer::Error) -> Self {
        SourceError::Bluetooth(err.to_string())
    }
}

/// Advertisement source backed by the BlueZ advertisement monitor.
///
/// Each [`subscribe`](AdvertisementSource::subscribe) call powers the default
/// adapter, registers a fresh monitor and pumps its events into the returned
/// channel until the receiver is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct BluerSource;

impl AdvertisementSource for BluerSource {
    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, SourceError>> + Send + '_>>
    {
        Box::pin(async move { start_monitor().await })
    }
}

async fn start_monitor() -> Result<mpsc::Receiver<Advertisement>, SourceError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager.register(Monitor::default()).await?;

    // Spawn a task that owns all Bluetooth state and runs the event loop.
    // It ends when the monitor stream closes or every receiver is gone.
    tokio::spawn(async move {
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            if let MonitorEvent::DeviceFound(device_id) = event {
                match read_advertisement(&adapter, device_id.device).await {
                    Ok(Some(advertisement)) => {
                        if tx.send(advertisement).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "failed to read advertisement"),
                }
            }
        }
    });

    Ok(rx)
}

/// Read the advertisement-level properties of a discovered device.
///
/// Returns `Ok(None)` when BlueZ has no signal strength for the device yet;
/// such sightings carry nothing the registry could store.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> Result<Option<Advertisement>, SourceError> {
    let device = adapter.device(address)?;

    let rssi = match device.rssi().await? {
        Some(rssi) => rssi,
        None => return Ok(None),
    };
    let local_name = device.name().await?;

    Ok(Some(Advertisement {
        address: address.into(),
        local_name,
        rssi,
        timestamp: Instant::now(),
    }))
}

/// Device metadata resolver backed by BlueZ device properties.
pub struct BluerResolver {
    adapter: Adapter,
}

impl BluerResolver {
    /// Connect to the BlueZ daemon and bind the default adapter.
    pub async fn new() -> Result<Self, SourceError> {
        let session = Session::new().await?;
        let adapter = session.default_adapter().await?;
        Ok(Self { adapter })
    }
}

impl DeviceInfoResolver for BluerResolver {
    fn resolve(
        &self,
        address: BleAddress,
    ) -> Pin<Box<dyn Future<Output = Option<ExtendedDeviceInfo>> + Send + '_>> {
        Box::pin(async move { lookup(&self.adapter, address.into()).await })
    }
}

async fn lookup(adapter: &Adapter, address: Address) -> Option<ExtendedDeviceInfo> {
    let device = adapter.device(address).ok()?;

    let name = device.name().await.ok()?;
    let connected = device.is_connected().await.ok()?;
    let paired = device.is_paired().await.ok()?;
    // BlueZ models pairability on the adapter, not the peer.
    let pairable = adapter.is_pairable().await.ok()?;

    Some(ExtendedDeviceInfo {
        name,
        connected,
        pairable,
        paired,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_round_trip() {
        let addr = Address([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let ble: BleAddress = addr.into();
        assert_eq!(ble, BleAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        let back: Address = ble.into();
        assert_eq!(back, addr);
    }
}

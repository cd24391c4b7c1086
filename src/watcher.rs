//! Watcher session: lifecycle, event pump and notification fan-out.
//!
//! An [`AdvertisementWatcher`] consumes an [`AdvertisementSource`], keeps the
//! device registry current and republishes classified [`WatcherEvent`]s to
//! registered subscribers. It is either `Stopped` or `Listening`; stopping
//! clears the registry so a fresh start never carries stale sightings.

use crate::classify::classify;
use crate::device::DeviceRecord;
use crate::registry::{DEFAULT_HEARTBEAT_TIMEOUT, DeviceRegistry};
use crate::source::{
    Advertisement, AdvertisementSource, DeviceInfoResolver, ExtendedDeviceInfo, SourceError,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A classified change notification.
///
/// For one advertisement the watcher emits `Discovered` first, then
/// `NameChanged` and `NewDevice` when they apply, in that fixed order: the
/// generic update always precedes the more specific notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherEvent {
    /// The session started listening.
    Started,
    /// The session stopped listening, explicitly or because the source ended.
    Stopped,
    /// An advertisement was processed for this device.
    Discovered(DeviceRecord),
    /// The device was seen for the first time.
    NewDevice(DeviceRecord),
    /// The device's known name differs from the previously known one.
    NameChanged(DeviceRecord),
    /// The device went silent past the heartbeat timeout and was evicted.
    TimedOut(DeviceRecord),
}

type Subscriber = Arc<dyn Fn(&WatcherEvent) + Send + Sync>;

/// Errors returned when assembling a watcher.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("an advertisement source is required")]
    MissingSource,
}

/// Errors returned by a running watcher.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Builder for [`AdvertisementWatcher`].
#[derive(Default)]
pub struct WatcherBuilder {
    source: Option<Box<dyn AdvertisementSource>>,
    resolver: Option<Arc<dyn DeviceInfoResolver>>,
    heartbeat_timeout: Option<Duration>,
}

impl WatcherBuilder {
    /// The advertisement source to consume. Required.
    pub fn source(mut self, source: impl AdvertisementSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Optional per-device metadata lookup. When present, every event is
    /// enriched before it reaches the registry and events whose lookup fails
    /// are dropped.
    pub fn resolver(mut self, resolver: impl DeviceInfoResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Eviction window for silent devices. Defaults to 30 seconds.
    pub fn heartbeat_timeout(mut self, heartbeat_timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(heartbeat_timeout);
        self
    }

    pub fn build(self) -> Result<AdvertisementWatcher, BuildError> {
        let source = self.source.ok_or(BuildError::MissingSource)?;
        Ok(AdvertisementWatcher {
            shared: Arc::new(Shared {
                registry: DeviceRegistry::new(
                    self.heartbeat_timeout.unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT),
                ),
                resolver: self.resolver,
                subscribers: Mutex::new(Vec::new()),
                lifecycle: tokio::sync::Mutex::new(Lifecycle {
                    phase: Phase::Stopped,
                    epoch: 0,
                    pump: None,
                }),
            }),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Listening,
}

struct Lifecycle {
    phase: Phase,
    /// Distinguishes pump incarnations across start/stop cycles, so an old
    /// pump winding down cannot act on behalf of a newer session.
    epoch: u64,
    pump: Option<JoinHandle<()>>,
}

struct Shared {
    registry: DeviceRegistry,
    resolver: Option<Arc<dyn DeviceInfoResolver>>,
    subscribers: Mutex<Vec<Subscriber>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

impl Shared {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invoke every subscriber in registration order, outside all locks.
    ///
    /// Each handler runs isolated: one panicking must not suppress delivery
    /// to the handlers after it.
    fn dispatch(&self, event: &WatcherEvent) {
        let handlers: Vec<Subscriber> = self.subscribers().clone();
        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(?event, "subscriber panicked while handling event");
            }
        }
    }

    /// Evict silent devices and notify per eviction.
    fn sweep_now(&self) {
        for record in self.registry.sweep(Instant::now()) {
            debug!(device = %record, "device timed out");
            self.dispatch(&WatcherEvent::TimedOut(record));
        }
    }

    /// Classify one (possibly enriched) advertisement and fan out the result.
    fn process(
        &self,
        advertisement: Advertisement,
        extended: Option<ExtendedDeviceInfo>,
        generation: u64,
    ) {
        match classify(
            &self.registry,
            generation,
            &advertisement,
            extended.as_ref(),
        ) {
            Some(outcome) => {
                self.dispatch(&WatcherEvent::Discovered(outcome.record.clone()));
                if outcome.name_changed {
                    self.dispatch(&WatcherEvent::NameChanged(outcome.record.clone()));
                }
                if outcome.new_discovery {
                    self.dispatch(&WatcherEvent::NewDevice(outcome.record));
                }
            }
            None => debug!(
                address = %advertisement.address,
                "discarding advertisement resolved after session reset"
            ),
        }
    }
}

/// Tracks nearby BLE devices from an advertisement stream.
pub struct AdvertisementWatcher {
    shared: Arc<Shared>,
    source: Box<dyn AdvertisementSource>,
}

impl AdvertisementWatcher {
    pub fn builder() -> WatcherBuilder {
        WatcherBuilder::default()
    }

    /// Register a notification handler.
    ///
    /// Handlers are invoked sequentially in registration order, after the
    /// registry state for the notification has been committed.
    pub fn subscribe(&self, handler: impl Fn(&WatcherEvent) + Send + Sync + 'static) {
        self.shared.subscribers().push(Arc::new(handler));
    }

    /// Start consuming the advertisement source.
    ///
    /// A no-op when already listening. `Started` is emitted only after the
    /// source confirmed activation; activation failures propagate instead.
    pub async fn start(&self) -> Result<(), WatcherError> {
        let mut lifecycle = self.shared.lifecycle.lock().await;
        if lifecycle.phase == Phase::Listening {
            return Ok(());
        }

        let receiver = self.source.subscribe().await?;
        lifecycle.phase = Phase::Listening;
        lifecycle.epoch += 1;
        let epoch = lifecycle.epoch;
        lifecycle.pump = Some(tokio::spawn(pump(
            Arc::clone(&self.shared),
            receiver,
            epoch,
        )));
        drop(lifecycle);

        info!("started listening for advertisements");
        self.shared.dispatch(&WatcherEvent::Started);
        Ok(())
    }

    /// Stop consuming the source and clear the registry.
    ///
    /// A no-op when already stopped. In-flight metadata lookups are abandoned
    /// rather than awaited; their late results are discarded by the registry
    /// generation check.
    pub async fn stop(&self) {
        let mut lifecycle = self.shared.lifecycle.lock().await;
        if lifecycle.phase == Phase::Stopped {
            return;
        }

        if let Some(pump) = lifecycle.pump.take() {
            pump.abort();
        }
        lifecycle.phase = Phase::Stopped;
        lifecycle.epoch += 1;
        self.shared.registry.clear();
        drop(lifecycle);

        info!("stopped listening for advertisements");
        self.shared.dispatch(&WatcherEvent::Stopped);
    }

    pub async fn is_listening(&self) -> bool {
        self.shared.lifecycle.lock().await.phase == Phase::Listening
    }

    /// The current device list, ordered by address.
    ///
    /// Sweeps first, emitting `TimedOut` for anything evicted, so polling
    /// consumers observe evictions even without new advertisements arriving.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        let snapshot = self.shared.registry.snapshot(Instant::now());
        for record in snapshot.timed_out {
            debug!(device = %record, "device timed out");
            self.shared.dispatch(&WatcherEvent::TimedOut(record));
        }
        snapshot.devices
    }

    /// Number of currently tracked devices, after a sweep.
    pub fn device_count(&self) -> usize {
        self.devices().len()
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.shared.registry.heartbeat_timeout()
    }

    /// Change the eviction window. Takes effect on the next sweep.
    pub fn set_heartbeat_timeout(&self, heartbeat_timeout: Duration) {
        self.shared.registry.set_heartbeat_timeout(heartbeat_timeout);
    }
}

/// Consume the source channel until it closes or the session stops.
///
/// Per event: sweep, then classify and notify. With a resolver configured the
/// enrichment runs on its own task so slow lookups never stall the pump;
/// the generation captured here guards the eventual commit.
async fn pump(shared: Arc<Shared>, mut receiver: mpsc::Receiver<Advertisement>, epoch: u64) {
    while let Some(advertisement) = receiver.recv().await {
        shared.sweep_now();
        let generation = shared.registry.generation();

        match &shared.resolver {
            Some(resolver) => {
                let resolver = Arc::clone(resolver);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    match resolver.resolve(advertisement.address).await {
                        Some(extended) => shared.process(advertisement, Some(extended), generation),
                        None => debug!(
                            address = %advertisement.address,
                            "device info lookup failed, dropping advertisement"
                        ),
                    }
                });
            }
            None => shared.process(advertisement, None, generation),
        }
    }

    // The source ended on its own: treat it like a stop, since the inbound
    // stream can no longer be assumed valid.
    let mut lifecycle = shared.lifecycle.lock().await;
    if lifecycle.phase == Phase::Listening && lifecycle.epoch == epoch {
        lifecycle.phase = Phase::Stopped;
        lifecycle.epoch += 1;
        lifecycle.pump = None;
        shared.registry.clear();
        drop(lifecycle);

        warn!("advertisement source stopped unexpectedly");
        shared.dispatch(&WatcherEvent::Stopped);
    }
}

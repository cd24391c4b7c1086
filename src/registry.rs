//! Device registry with heartbeat-based eviction.
//!
//! The registry is the single shared mutable resource of the crate: a
//! mutex-guarded map from radio address to the latest [`DeviceRecord`] for
//! that device. Every operation acquires and releases the guard internally;
//! the raw map is never exposed, and critical sections contain only map work.

use crate::address::BleAddress;
use crate::device::DeviceRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Devices not re-advertised within this window are evicted by default.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of inserting or replacing a record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// The record as stored, after name inheritance.
    pub record: DeviceRecord,
    /// The address was not present before this upsert.
    pub new_discovery: bool,
    /// The device's known name differs from the previously known one.
    pub name_changed: bool,
}

/// A point-in-time copy of the registry, taken after a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweptSnapshot {
    /// Surviving records, ordered by address.
    pub devices: Vec<DeviceRecord>,
    /// Records the sweep evicted while taking the snapshot.
    pub timed_out: Vec<DeviceRecord>,
}

#[derive(Debug)]
struct RegistryState {
    devices: HashMap<BleAddress, DeviceRecord>,
    heartbeat_timeout: Duration,
    generation: u64,
}

/// Concurrent address-keyed store of the latest record per device.
#[derive(Debug)]
pub struct DeviceRegistry {
    state: Mutex<RegistryState>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

impl DeviceRegistry {
    /// Create an empty registry with the given heartbeat timeout.
    pub fn new(heartbeat_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                devices: HashMap::new(),
                heartbeat_timeout,
                generation: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the record for `candidate.address`.
    ///
    /// Replacement is wholesale, except that a candidate with a blank name
    /// inherits the previous non-blank name: broadcasts frequently omit the
    /// name after the first advertisement, so a known name is sticky.
    pub fn upsert(&self, candidate: DeviceRecord) -> UpsertOutcome {
        Self::apply(&mut self.state(), candidate)
    }

    /// Upsert only if the registry generation still matches `generation`.
    ///
    /// The generation advances on every [`clear`](Self::clear), so a result
    /// resolved before a stop/reset is discarded here instead of re-creating
    /// an entry the session no longer owns.
    pub fn commit(&self, generation: u64, candidate: DeviceRecord) -> Option<UpsertOutcome> {
        let mut state = self.state();
        if state.generation != generation {
            return None;
        }
        Some(Self::apply(&mut state, candidate))
    }

    fn apply(state: &mut RegistryState, mut candidate: DeviceRecord) -> UpsertOutcome {
        if let Some(previous) = state.devices.get(&candidate.address) {
            let name_changed = match (previous.known_name(), candidate.known_name()) {
                (Some(previous_name), Some(candidate_name)) => previous_name != candidate_name,
                _ => false,
            };
            if candidate.known_name().is_none() {
                candidate.name = previous.name.clone();
            }
            state.devices.insert(candidate.address, candidate.clone());
            UpsertOutcome {
                record: candidate,
                new_discovery: false,
                name_changed,
            }
        } else {
            state.devices.insert(candidate.address, candidate.clone());
            UpsertOutcome {
                record: candidate,
                new_discovery: true,
                name_changed: false,
            }
        }
    }

    /// Remove and return every record whose last sighting is older than the
    /// heartbeat timeout. A second sweep with no new events removes nothing.
    pub fn sweep(&self, now: Instant) -> Vec<DeviceRecord> {
        Self::evict(&mut self.state(), now)
    }

    fn evict(state: &mut RegistryState, now: Instant) -> Vec<DeviceRecord> {
        let timeout = state.heartbeat_timeout;
        let expired: Vec<BleAddress> = state
            .devices
            .values()
            .filter(|record| now.saturating_duration_since(record.last_seen) > timeout)
            .map(|record| record.address)
            .collect();
        expired
            .iter()
            .filter_map(|address| state.devices.remove(address))
            .collect()
    }

    /// Sweep, then copy the surviving records ordered by address.
    ///
    /// Both steps happen under one lock acquisition so callers never observe
    /// an entry that is already past its heartbeat timeout.
    pub fn snapshot(&self, now: Instant) -> SweptSnapshot {
        let mut state = self.state();
        let timed_out = Self::evict(&mut state, now);
        let mut devices: Vec<DeviceRecord> = state.devices.values().cloned().collect();
        devices.sort_by_key(|record| record.address);
        SweptSnapshot { devices, timed_out }
    }

    /// Remove all records unconditionally and advance the generation.
    pub fn clear(&self) {
        let mut state = self.state();
        state.devices.clear();
        state.generation += 1;
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.state().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().devices.is_empty()
    }

    /// The current clear-generation, captured before a deferred commit.
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.state().heartbeat_timeout
    }

    /// Change the eviction window. Takes effect on the next sweep.
    pub fn set_heartbeat_timeout(&self, heartbeat_timeout: Duration) {
        self.state().heartbeat_timeout = heartbeat_timeout;
    }
}

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// # Examples
/// ```
/// use ble_watcher::registry::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    if let Some(num) = src.strip_suffix("ms") {
        let millis: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid milliseconds: {}", num))?;
        return Ok(Duration::from_millis(millis));
    }

    if let Some(num) = src.strip_suffix('h') {
        let hours: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid hours: {}", num))?;
        return Ok(Duration::from_secs(hours * 3600));
    }

    if let Some(num) = src.strip_suffix('m') {
        let minutes: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid minutes: {}", num))?;
        return Ok(Duration::from_secs(minutes * 60));
    }

    if let Some(num) = src.strip_suffix('s') {
        let secs: u64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid seconds: {}", num))?;
        return Ok(Duration::from_secs(secs));
    }

    // No suffix, treat as seconds
    let secs: u64 = src
        .parse()
        .map_err(|_| format!("invalid duration: {}", src))?;
    Ok(Duration::from_secs(secs))
}

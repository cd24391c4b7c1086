//! Advertisement classification.
//!
//! Turns a raw advertisement (plus optional extended metadata) into a
//! candidate [`DeviceRecord`] and delegates to the registry upsert, which is
//! where name stickiness is enforced. The outcome tells the watcher session
//! which notifications to emit.

use crate::device::{DeviceRecord, PairingState};
use crate::registry::{DeviceRegistry, UpsertOutcome};
use crate::source::{Advertisement, ExtendedDeviceInfo};

/// Build the candidate record for one advertisement.
///
/// The platform-resolved name takes precedence over the name carried in the
/// broadcast payload; pairing state exists only when extended metadata was
/// resolved.
pub fn build_record(
    advertisement: &Advertisement,
    extended: Option<&ExtendedDeviceInfo>,
) -> DeviceRecord {
    let resolved_name = extended
        .and_then(|info| info.name.clone())
        .filter(|name| !name.is_empty());

    DeviceRecord {
        address: advertisement.address,
        name: resolved_name.or_else(|| advertisement.local_name.clone()),
        rssi: advertisement.rssi,
        last_seen: advertisement.timestamp,
        pairing: extended.map(|info| PairingState {
            connected: info.connected,
            pairable: info.pairable,
            paired: info.paired,
        }),
    }
}

/// Classify one advertisement against the current registry state.
///
/// Returns `None` when the registry generation moved on since `generation`
/// was captured, i.e. the session was stopped or reset while the event's
/// metadata lookup was in flight.
pub fn classify(
    registry: &DeviceRegistry,
    generation: u64,
    advertisement: &Advertisement,
    extended: Option<&ExtendedDeviceInfo>,
) -> Option<UpsertOutcome> {
    registry.commit(generation, build_record(advertisement, extended))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_ADDRESS, advertisement};
    use std::time::Instant;

    fn extended_info(name: Option<&str>) -> ExtendedDeviceInfo {
        ExtendedDeviceInfo {
            name: name.map(str::to_string),
            connected: true,
            pairable: true,
            paired: false,
        }
    }

    #[test]
    fn test_build_record_from_broadcast_only() {
        let mut ad = advertisement(TEST_ADDRESS, Instant::now());
        ad.local_name = Some("Beacon".to_string());
        ad.rssi = -60;

        let record = build_record(&ad, None);

        assert_eq!(record.address, TEST_ADDRESS);
        assert_eq!(record.known_name(), Some("Beacon"));
        assert_eq!(record.rssi, -60);
        assert_eq!(record.last_seen, ad.timestamp);
        assert_eq!(record.pairing, None);
    }

    #[test]
    fn test_build_record_prefers_resolved_name() {
        let mut ad = advertisement(TEST_ADDRESS, Instant::now());
        ad.local_name = Some("Beacon".to_string());

        let record = build_record(&ad, Some(&extended_info(Some("Kitchen Speaker"))));

        assert_eq!(record.known_name(), Some("Kitchen Speaker"));
    }

    #[test]
    fn test_build_record_falls_back_to_local_name() {
        let mut ad = advertisement(TEST_ADDRESS, Instant::now());
        ad.local_name = Some("Beacon".to_string());

        let record = build_record(&ad, Some(&extended_info(None)));
        assert_eq!(record.known_name(), Some("Beacon"));

        let record = build_record(&ad, Some(&extended_info(Some(""))));
        assert_eq!(record.known_name(), Some("Beacon"));
    }

    #[test]
    fn test_build_record_carries_pairing_state() {
        let ad = advertisement(TEST_ADDRESS, Instant::now());

        let record = build_record(&ad, Some(&extended_info(None)));

        let pairing = record.pairing.unwrap();
        assert!(pairing.connected);
        assert!(pairing.pairable);
        assert!(!pairing.paired);
    }

    #[test]
    fn test_classify_delegates_to_registry() {
        let registry = DeviceRegistry::default();
        let ad = advertisement(TEST_ADDRESS, Instant::now());

        let outcome = classify(&registry, registry.generation(), &ad, None).unwrap();

        assert!(outcome.new_discovery);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_classify_discards_stale_generation() {
        let registry = DeviceRegistry::default();
        let generation = registry.generation();
        registry.clear();

        let ad = advertisement(TEST_ADDRESS, Instant::now());
        assert!(classify(&registry, generation, &ad, None).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_classify_applies_name_stickiness() {
        let registry = DeviceRegistry::default();
        let mut named = advertisement(TEST_ADDRESS, Instant::now());
        named.local_name = Some("Beacon".to_string());
        classify(&registry, registry.generation(), &named, None);

        let anonymous = advertisement(TEST_ADDRESS, Instant::now());
        let outcome = classify(&registry, registry.generation(), &anonymous, None).unwrap();

        assert_eq!(outcome.record.known_name(), Some("Beacon"));
        assert!(!outcome.name_changed);
    }
}

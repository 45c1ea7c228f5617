//! Integration tests for the durable configuration store.
//!
//! These simulate reboots by moving the region out of one store and into a
//! fresh one, the way the firmware reloads it on every boot.

use pretty_assertions::assert_eq;
use sensorcentral_core::config::{
    ConfigurationUpdate, CONFIGURATION_RECORD_LEN, CREDENTIALS_OFFSET, MAX_ENDPOINT_LEN,
    MAX_TOKEN_LEN, REGION_LEN,
};
use sensorcentral_core::{ConfigStore, Configuration, MemoryRegion, NetworkCredentials};

/// Reboot: hand the same region to a new store.
fn reboot(store: ConfigStore<MemoryRegion>) -> ConfigStore<MemoryRegion> {
    ConfigStore::new(store.into_region())
}

#[test]
fn test_settings_survive_reboot() {
    let mut store = ConfigStore::new(MemoryRegion::new());
    let mut config = store.load_configuration();
    let _ = store.load_credentials();

    ConfigurationUpdate {
        endpoint: Some("collector.local/api/data".to_string()),
        token: Some("t".repeat(MAX_TOKEN_LEN + 50)),
        sensor_type: Some("DS18B20".to_string()),
        post_interval_ms: Some(60_000),
        ..Default::default()
    }
    .apply_to(&mut config);
    store.save_configuration(&config).unwrap();
    store
        .save_credentials(&NetworkCredentials::new("HomeNet", "hunter22", true))
        .unwrap();

    let mut store = reboot(store);
    let loaded = store.load_configuration();
    assert_eq!(loaded, config);
    assert_eq!(loaded.token.len(), MAX_TOKEN_LEN);
    assert_eq!(loaded.print_interval_ms, 10_000);

    let credentials = store.load_credentials();
    assert_eq!(credentials.network_name, "HomeNet");
    assert!(credentials.keep_access_point_on);
}

#[test]
fn test_maximum_length_fields_round_trip() {
    let config = Configuration {
        endpoint: "e".repeat(MAX_ENDPOINT_LEN),
        token: "é".repeat(MAX_TOKEN_LEN / 2),
        ..Default::default()
    };

    let mut store = ConfigStore::new(MemoryRegion::new());
    store.save_configuration(&config).unwrap();
    let mut store = reboot(store);
    assert_eq!(store.load_configuration(), config);
}

#[test]
fn test_corrupt_configuration_resets_everything() {
    let mut store = ConfigStore::new(MemoryRegion::new());
    store
        .save_configuration(&Configuration {
            endpoint: "old.example".to_string(),
            ..Default::default()
        })
        .unwrap();
    store
        .save_credentials(&NetworkCredentials::new("HomeNet", "secret", false))
        .unwrap();

    // Stale layout version from an older firmware
    let mut bytes = store.into_region().as_bytes().to_vec();
    bytes[0] = 3;
    let mut store = ConfigStore::new(MemoryRegion::from_bytes(bytes));

    assert_eq!(store.load_configuration(), Configuration::default());
    assert_eq!(store.load_credentials(), NetworkCredentials::default());

    let bytes = store.region().as_bytes();
    assert_eq!(bytes.len(), REGION_LEN);
    assert_eq!(bytes[0], 4);
    assert_eq!(bytes[CREDENTIALS_OFFSET], 1);
    assert_eq!(CREDENTIALS_OFFSET, CONFIGURATION_RECORD_LEN);
}

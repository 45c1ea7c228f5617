//! # sensorcentral-core
//!
//! Core SensorCentral data model, configuration records and sensor backends.
//!
//! This crate provides:
//! - Data model types (device identity, sensor readings, telemetry response)
//! - Versioned configuration records and the durable store they live in
//! - Hardware seam traits for probe buses, climate sensors and switch inputs
//! - The polymorphic sensor backend and its three variants
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (simulator) and ESP32 (esp-idf) targets.

pub mod config;
pub mod hardware;
pub mod model;
pub mod sensor;

pub use config::{
    ConfigStore, Configuration, DurableRegion, MemoryRegion, NetworkCredentials, StorageError,
};
pub use hardware::HardwareError;
pub use model::*;
pub use sensor::{select_backend, SensorBackend, SensorHardware, SensorType};

//! ESP32-specific components for SensorCentral nodes.
//!
//! This crate provides the platform side of the node runtime:
//! - Wi-Fi radio running station and access point together
//! - Ethernet interface over an RMII PHY
//! - NVS-backed durable region for the settings records
//! - HTTP client for telemetry and the web server bridge into the main loop
//! - 1-Wire, DHT22 and switch ports plus the indicator pins
//!
//! # Architecture
//!
//! Everything here implements a trait from `sensorcentral-core` or
//! `sensorcentral-node`; the main loop itself is shared with the Linux
//! simulator. The firmware binary (`sensorcentral-esp32`) wires the
//! peripherals to these adapters.
//!
//! # Example
//!
//! ```ignore
//! use sensorcentral_esp32::wifi::EspRadio;
//! use sensorcentral_esp32::http::EspClient;
//! use sensorcentral_node::transport::StationAndAccessPoint;
//!
//! let radio = EspRadio::new(peripherals.modem, sysloop, nvs)?;
//! let transport = StationAndAccessPoint::boot(radio, EspClient, credentials, now)?;
//! ```

pub mod ethernet;
pub mod hardware;
pub mod http;
pub mod storage;
pub mod wifi;

/// Render a driver error for a node-level error message.
pub(crate) fn describe<E: core::fmt::Debug>(e: E) -> String {
    format!("{:?}", e)
}

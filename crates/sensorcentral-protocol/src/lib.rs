//! # sensorcentral-protocol
//!
//! SensorCentral telemetry message types and codec.
//!
//! This crate defines the JSON documents a node posts to its collector and
//! the HTTP header set that accompanies them.

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;

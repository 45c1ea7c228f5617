//! Telemetry message types.
//!
//! Two documents are posted to the collector:
//! - `data`: the current sensor snapshot, sent every post interval
//! - `control`: a one-shot restart announcement, sent once per boot
//!
//! Field order is part of the wire format, so the structs list fields in the
//! order they are serialized.

use sensorcentral_core::{DeviceIdentity, SensorSnapshot};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Discriminator carried in every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Data,
    Control,
}

/// Network details of the sending node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub ip: String,
}

/// One reading in a data message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub sensor_id: String,
    /// `None` (JSON `null`) for a non-finite reading such as a failed DHT22 read.
    pub sensor_value: Option<f32>,
}

/// Periodic telemetry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataMessage {
    pub msgtype: MessageType,
    pub device_id: String,
    pub device_data: DeviceData,
    pub data: Vec<DataPoint>,
}

impl DataMessage {
    /// Build the payload for `snapshot`, preserving reading order.
    pub fn from_snapshot(snapshot: &SensorSnapshot, identity: &DeviceIdentity, ip: Ipv4Addr) -> Self {
        Self {
            msgtype: MessageType::Data,
            device_id: identity.to_string(),
            device_data: DeviceData { ip: ip.to_string() },
            data: snapshot
                .iter()
                .map(|r| DataPoint {
                    sensor_id: r.id.to_string(),
                    sensor_value: Some(r.value).filter(|v| v.is_finite()),
                })
                .collect(),
        }
    }
}

/// Body of a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlData {
    pub restart: bool,
    pub ip: String,
}

/// One-shot announcement sent after boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    pub msgtype: MessageType,
    pub device_id: String,
    pub data: ControlData,
}

impl ControlMessage {
    pub fn restarted(identity: &DeviceIdentity, ip: Ipv4Addr) -> Self {
        Self {
            msgtype: MessageType::Control,
            device_id: identity.to_string(),
            data: ControlData {
                restart: true,
                ip: ip.to_string(),
            },
        }
    }
}

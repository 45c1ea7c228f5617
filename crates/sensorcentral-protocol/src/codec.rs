//! JSON codec and HTTP header set for telemetry posts.

use crate::messages::{ControlMessage, DataMessage};
use thiserror::Error;

/// Product version sent with every post.
pub const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short note describing the most recent firmware change.
pub const LAST_CHANGE: &str = "Pluggable sensor backends";

pub const VERSION_HEADER: &str = "X-SensorCentral-Version";
pub const LAST_CHANGE_HEADER: &str = "X-SensorCentral-LastChange";

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Encode a data message. Identical input always yields identical bytes.
pub fn encode_data_message(msg: &DataMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

pub fn encode_control_message(msg: &ControlMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

/// Decode a data message, e.g. as received by a collector.
pub fn decode_data_message(text: &str) -> Result<DataMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

pub fn decode_control_message(text: &str) -> Result<ControlMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

/// Full URL for a configured endpoint; bare hosts are posted over plain HTTP.
pub fn endpoint_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Headers for a telemetry post of `body_len` bytes.
///
/// `Authorization` is present only when `token` is non-empty.
pub fn telemetry_headers(body_len: usize, token: &str) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Content-Length".to_string(), body_len.to_string()),
        (VERSION_HEADER.to_string(), PRODUCT_VERSION.to_string()),
        (LAST_CHANGE_HEADER.to_string(), LAST_CHANGE.to_string()),
    ];
    if !token.is_empty() {
        headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{DataMessage, ControlMessage};
    use pretty_assertions::assert_eq;
    use sensorcentral_core::{DeviceIdentity, SensorId, SensorSnapshot};
    use std::net::Ipv4Addr;

    const IDENTITY: DeviceIdentity = DeviceIdentity([0xA4, 0xCF, 0x12, 0xD8, 0x3B, 0x01]);
    const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 40);

    fn snapshot() -> SensorSnapshot {
        let mut snapshot = SensorSnapshot::new();
        snapshot.push(SensorId::new("A4CF12D83B01_temp").unwrap(), 21.5);
        snapshot.push(SensorId::new("A4CF12D83B01_hum").unwrap(), f32::NAN);
        snapshot
    }

    #[test]
    fn test_encode_data_message_shape() {
        let json = encode_data_message(&DataMessage::from_snapshot(&snapshot(), &IDENTITY, IP)).unwrap();
        assert_eq!(
            json,
            r#"{"msgtype":"data","deviceId":"A4:CF:12:D8:3B:01","deviceData":{"ip":"192.168.1.40"},"data":[{"sensorId":"A4CF12D83B01_temp","sensorValue":21.5},{"sensorId":"A4CF12D83B01_hum","sensorValue":null}]}"#
        );
    }

    #[test]
    fn test_encode_is_byte_identical() {
        let first = encode_data_message(&DataMessage::from_snapshot(&snapshot(), &IDENTITY, IP)).unwrap();
        let second = encode_data_message(&DataMessage::from_snapshot(&snapshot(), &IDENTITY, IP)).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_encode_control_message_shape() {
        let json = encode_control_message(&ControlMessage::restarted(&IDENTITY, IP)).unwrap();
        assert_eq!(
            json,
            r#"{"msgtype":"control","deviceId":"A4:CF:12:D8:3B:01","data":{"restart":true,"ip":"192.168.1.40"}}"#
        );
        assert_eq!(decode_control_message(&json).unwrap(), ControlMessage::restarted(&IDENTITY, IP));
    }

    #[test]
    fn test_decode_rejects_other_documents() {
        assert!(decode_data_message(r#"{"msgtype":"data"}"#).is_err());
        assert!(decode_data_message("not json").is_err());
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(endpoint_url("collector.local/api"), "http://collector.local/api");
        assert_eq!(endpoint_url("https://collector.example/api"), "https://collector.example/api");
    }

    #[test]
    fn test_headers_with_and_without_token() {
        let headers = telemetry_headers(42, "abc.def");
        assert_eq!(headers[1], ("Content-Length".to_string(), "42".to_string()));
        assert!(headers.iter().any(|(k, _)| k == VERSION_HEADER));
        assert!(headers.iter().any(|(k, _)| k == LAST_CHANGE_HEADER));
        assert_eq!(
            headers.last().unwrap(),
            &("Authorization".to_string(), "Bearer abc.def".to_string())
        );

        let headers = telemetry_headers(42, "");
        assert!(headers.iter().all(|(k, _)| k != "Authorization"));
        assert_eq!(headers.len(), 4);
    }
}

//! SensorCentral data model types.
//!
//! These types are shared by the sensor backends, the telemetry payload builder
//! and the diagnostics views. Size caps that used to be implied by fixed
//! buffers are explicit truncation rules here.

use serde::Serialize;
use std::fmt;

/// Maximum number of readings a single poll may produce.
pub const MAX_SENSORS: usize = 10;

/// Maximum length of a sensor identifier, in bytes.
pub const MAX_SENSOR_ID_LEN: usize = 36;

/// Decimal places used when a reading is shown to a person.
pub const VALUE_DECIMALS: usize = 4;

/// Maximum number of response body bytes kept for diagnostics.
pub const MAX_RESPONSE_BODY_LEN: usize = 2048;

/// Truncate `text` to at most `max` bytes without splitting a UTF-8 sequence.
pub fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

// ============================================================================
// Device identity
// ============================================================================

/// Six-byte hardware address of the node.
///
/// Used as device ID in telemetry and as the seed for generated sensor and
/// access point names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceIdentity(pub [u8; 6]);

impl DeviceIdentity {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Identity without separators, e.g. `A4CF12D83B01`.
    pub fn compact(&self) -> String {
        self.0.iter().map(|b| format!("{:02X}", b)).collect()
    }

    /// Name of the local access point, e.g. `SensorCentral-A4CF12D83B01`.
    pub fn network_name(&self) -> String {
        format!("SensorCentral-{}", self.compact())
    }
}

/// Colon-separated display form, e.g. `A4:CF:12:D8:3B:01`.
impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

// ============================================================================
// Sensor readings
// ============================================================================

/// Stable, non-empty sensor identifier of at most [`MAX_SENSOR_ID_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorId(String);

impl SensorId {
    /// Build an identifier, truncating over-long input.
    ///
    /// Returns `None` for an empty identifier.
    pub fn new(id: &str) -> Option<Self> {
        let id = truncate_utf8(id, MAX_SENSOR_ID_LEN);
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    /// Identifier derived from the device identity, e.g. `A4CF12D83B01_temp`.
    pub fn derived(identity: &DeviceIdentity, suffix: &str) -> Self {
        let id = format!("{}{}", identity.compact(), suffix);
        Self(truncate_utf8(&id, MAX_SENSOR_ID_LEN).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sensor value under its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub id: SensorId,
    pub value: f32,
}

/// Ordered set of readings produced by one poll.
///
/// Never holds more than [`MAX_SENSORS`] entries. Replaced wholesale on each poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    readings: Vec<SensorReading>,
}

impl SensorSnapshot {
    pub fn new() -> Self {
        Self {
            readings: Vec::with_capacity(MAX_SENSORS),
        }
    }

    /// Append a reading. Returns `false` once the snapshot is full.
    pub fn push(&mut self, id: SensorId, value: f32) -> bool {
        if self.readings.len() >= MAX_SENSORS {
            return false;
        }
        self.readings.push(SensorReading { id, value });
        true
    }

    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter()
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Outcome of the most recent telemetry post attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    /// HTTP status, or a negative value when the request never completed.
    pub status_code: i32,
    /// Response body, capped at [`MAX_RESPONSE_BODY_LEN`] bytes.
    pub body_text: String,
}

impl TelemetryResponse {
    pub fn new(status_code: i32, body: &str) -> Self {
        Self {
            status_code,
            body_text: truncate_utf8(body, MAX_RESPONSE_BODY_LEN).to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Network reachability, derived every loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    /// Only the local access point is up; no upstream network.
    AccessPointOnly,
    Connected,
}

impl ConnectivityState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityState::Connected)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectivityState::Disconnected => "NOT connected",
            ConnectivityState::AccessPointOnly => "Access point only",
            ConnectivityState::Connected => "Connected",
        };
        f.write_str(text)
    }
}

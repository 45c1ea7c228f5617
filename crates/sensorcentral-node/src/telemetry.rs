//! Telemetry client: builds payloads and posts them to the configured endpoint.
//!
//! Every post attempt produces a [`TelemetryResponse`], whatever the outcome.
//! Non-2xx statuses are only recorded; a request that never completes is
//! recorded as status `-1` with the error text as body.

use crate::transport::{HttpPost, NetworkTransport};
use sensorcentral_core::{Configuration, DeviceIdentity, SensorSnapshot, TelemetryResponse};
use sensorcentral_protocol::{
    encode_control_message, encode_data_message, endpoint_url, telemetry_headers, CodecError,
    ControlMessage, DataMessage,
};
use tracing::{debug, info, warn};

/// Status recorded when a post did not complete.
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

pub struct TelemetryClient<'a> {
    config: &'a Configuration,
    identity: DeviceIdentity,
}

impl<'a> TelemetryClient<'a> {
    pub fn new(config: &'a Configuration, identity: DeviceIdentity) -> Self {
        Self { config, identity }
    }

    /// Data payload for `snapshot` as seen from the transport's current address.
    pub fn build_payload<T: NetworkTransport>(
        &self,
        transport: &T,
        snapshot: &SensorSnapshot,
    ) -> DataMessage {
        DataMessage::from_snapshot(snapshot, &self.identity, transport.local_address())
    }

    pub fn post_readings<T: NetworkTransport>(
        &self,
        transport: &mut T,
        snapshot: &SensorSnapshot,
    ) -> TelemetryResponse {
        let body = encode_data_message(&self.build_payload(transport, snapshot));
        self.send(transport, body)
    }

    /// One-shot "restarted" control message.
    pub fn announce_restart<T: NetworkTransport>(&self, transport: &mut T) -> TelemetryResponse {
        let msg = ControlMessage::restarted(&self.identity, transport.local_address());
        self.send(transport, encode_control_message(&msg))
    }

    fn send<T: NetworkTransport>(
        &self,
        transport: &mut T,
        body: Result<String, CodecError>,
    ) -> TelemetryResponse {
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to encode telemetry: {}", e);
                return TelemetryResponse::new(TRANSPORT_FAILURE_STATUS, &e.to_string());
            }
        };

        let request = HttpPost {
            url: endpoint_url(&self.config.endpoint),
            headers: telemetry_headers(body.len(), &self.config.token),
            body,
        };
        debug!("Posting {} bytes to {}", request.body.len(), request.url);

        let response = match transport.post(&request) {
            Ok(reply) => TelemetryResponse::new(i32::from(reply.status), &reply.body),
            Err(e) => {
                warn!("Telemetry post failed: {}", e);
                TelemetryResponse::new(TRANSPORT_FAILURE_STATUS, &e.to_string())
            }
        };
        info!("Received response code: {}", response.status_code);
        debug!("Received payload: {}", response.body_text);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpReply, TransportError};
    use pretty_assertions::assert_eq;
    use sensorcentral_core::{ConnectivityState, SensorId, MAX_RESPONSE_BODY_LEN};
    use sensorcentral_protocol::decode_data_message;
    use std::net::Ipv4Addr;

    struct StubTransport {
        reply: Result<HttpReply, TransportError>,
        sent: Vec<HttpPost>,
    }

    impl StubTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                reply: Ok(HttpReply {
                    status,
                    body: body.to_string(),
                }),
                sent: Vec::new(),
            }
        }
    }

    impl NetworkTransport for StubTransport {
        fn is_connected(&mut self, _now_ms: u64) -> bool {
            true
        }

        fn connectivity(&self) -> ConnectivityState {
            ConnectivityState::Connected
        }

        fn local_address(&self) -> Ipv4Addr {
            Ipv4Addr::new(192, 168, 1, 40)
        }

        fn hardware_identity(&self) -> DeviceIdentity {
            IDENTITY
        }

        fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError> {
            self.sent.push(request.clone());
            self.reply.clone()
        }
    }

    const IDENTITY: DeviceIdentity = DeviceIdentity([0xA4, 0xCF, 0x12, 0xD8, 0x3B, 0x01]);

    fn config(token: &str) -> Configuration {
        Configuration {
            endpoint: "collector.local/api/data".to_string(),
            token: token.to_string(),
            ..Default::default()
        }
    }

    fn snapshot() -> SensorSnapshot {
        let mut snapshot = SensorSnapshot::new();
        snapshot.push(SensorId::new("28FF4C06A116049E").unwrap(), 19.25);
        snapshot
    }

    #[test]
    fn test_post_readings_builds_request() {
        let config = config("eyJhbGciOi");
        let mut transport = StubTransport::replying(201, "created");
        let response = TelemetryClient::new(&config, IDENTITY).post_readings(&mut transport, &snapshot());

        assert_eq!(response, TelemetryResponse::new(201, "created"));
        let request = &transport.sent[0];
        assert_eq!(request.url, "http://collector.local/api/data");
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.header("Content-Length"), Some(request.body.len().to_string().as_str()));
        assert_eq!(request.header("Authorization"), Some("Bearer eyJhbGciOi"));
        assert!(request.header("X-SensorCentral-Version").is_some());
        assert!(request.header("X-SensorCentral-LastChange").is_some());

        let msg = decode_data_message(&request.body).unwrap();
        assert_eq!(msg.device_id, "A4:CF:12:D8:3B:01");
        assert_eq!(msg.device_data.ip, "192.168.1.40");
        assert_eq!(msg.data[0].sensor_value, Some(19.25));
    }

    #[test]
    fn test_no_token_no_authorization_header() {
        let config = config("");
        let mut transport = StubTransport::replying(200, "");
        TelemetryClient::new(&config, IDENTITY).post_readings(&mut transport, &snapshot());
        assert_eq!(transport.sent[0].header("Authorization"), None);
    }

    #[test]
    fn test_error_status_recorded_and_body_truncated() {
        let config = config("");
        let body = "x".repeat(MAX_RESPONSE_BODY_LEN * 2);
        let mut transport = StubTransport::replying(500, &body);
        let response = TelemetryClient::new(&config, IDENTITY).post_readings(&mut transport, &snapshot());

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body_text.len(), MAX_RESPONSE_BODY_LEN);
    }

    #[test]
    fn test_transport_failure_recorded() {
        let config = config("");
        let mut transport = StubTransport {
            reply: Err(TransportError::Connect("refused".to_string())),
            sent: Vec::new(),
        };
        let response = TelemetryClient::new(&config, IDENTITY).announce_restart(&mut transport);

        assert_eq!(response.status_code, TRANSPORT_FAILURE_STATUS);
        assert_eq!(response.body_text, "Connection failed: refused");
        assert!(transport.sent[0].body.contains(r#""msgtype":"control""#));
    }
}

//! Application state owned by the main loop.

use sensorcentral_core::{
    Configuration, ConnectivityState, DeviceIdentity, NetworkCredentials, TelemetryResponse,
};
use std::net::Ipv4Addr;

/// Everything the main loop mutates, in one place.
///
/// Sensor readings are not here: the active backend owns its snapshot.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Configuration,
    /// `None` on transports without credentials (wired).
    pub credentials: Option<NetworkCredentials>,
    pub identity: DeviceIdentity,
    pub local_address: Ipv4Addr,
    pub last_response: TelemetryResponse,
    pub connectivity: ConnectivityState,
}

impl AppState {
    pub fn new(
        config: Configuration,
        credentials: Option<NetworkCredentials>,
        identity: DeviceIdentity,
    ) -> Self {
        Self {
            config,
            credentials,
            identity,
            local_address: Ipv4Addr::UNSPECIFIED,
            last_response: TelemetryResponse::default(),
            connectivity: ConnectivityState::default(),
        }
    }

    /// Access point pinned on past the boot window.
    pub fn keep_access_point_on(&self) -> bool {
        self.credentials
            .as_ref()
            .map_or(false, |c| c.keep_access_point_on)
    }
}

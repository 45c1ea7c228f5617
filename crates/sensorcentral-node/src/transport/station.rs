//! Wi-Fi station with an always-on local access point.
//!
//! The access point comes up on every boot, open and named after the
//! hardware identity, so the node can be configured without an upstream
//! network. Joining the configured network is retried from `is_connected`
//! in rounds of [`CONNECT_ATTEMPTS`] joins spaced [`RECONNECT_SPACING_MS`]
//! apart. Each call makes at most one attempt, so the main loop keeps
//! serving the local web UI between attempts.

use super::{BootError, HttpClient, HttpPost, HttpReply, NetworkTransport, TransportError};
use sensorcentral_core::{ConnectivityState, DeviceIdentity, NetworkCredentials};
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

/// Join attempts per reconnect round.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Minimum time between reconnect rounds.
pub const RECONNECT_SPACING_MS: u64 = 10_000;

/// Platform Wi-Fi radio able to run station and access point together.
pub trait WifiRadio {
    fn hardware_identity(&self) -> DeviceIdentity;

    /// Bring up an open access point named `network_name`.
    fn start_access_point(&mut self, network_name: &str) -> Result<(), TransportError>;

    fn stop_access_point(&mut self) -> Result<(), TransportError>;

    /// Make one join attempt, blocking for at most a few seconds.
    ///
    /// A join still in progress when this returns may complete later and
    /// show up in [`is_joined`](WifiRadio::is_joined).
    fn join(&mut self, credentials: &NetworkCredentials) -> Result<(), TransportError>;

    fn is_joined(&self) -> bool;

    fn station_address(&self) -> Option<Ipv4Addr>;

    fn access_point_address(&self) -> Ipv4Addr;
}

pub struct StationAndAccessPoint<R: WifiRadio, H: HttpClient> {
    radio: R,
    http: H,
    credentials: NetworkCredentials,
    access_point_active: bool,
    last_round: Option<u64>,
    /// Attempts made in the current round; 0 when no round is running.
    round_attempts: u32,
    state: ConnectivityState,
}

impl<R: WifiRadio, H: HttpClient> StationAndAccessPoint<R, H> {
    /// Start the access point and make a first attempt to join the network.
    ///
    /// Fails only when the radio cannot start at all.
    pub fn boot(
        mut radio: R,
        http: H,
        credentials: NetworkCredentials,
        now_ms: u64,
    ) -> Result<Self, BootError> {
        let name = radio.hardware_identity().network_name();
        if let Err(e) = radio.start_access_point(&name) {
            error!("Failed to start access point: {}", e);
            return Err(BootError::NoNetworkHardware);
        }
        info!("Started AP {} on IP: {}", name, radio.access_point_address());

        let mut transport = Self {
            radio,
            http,
            credentials,
            access_point_active: true,
            last_round: None,
            round_attempts: 0,
            state: ConnectivityState::AccessPointOnly,
        };
        transport.is_connected(now_ms);
        Ok(transport)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn credentials(&self) -> &NetworkCredentials {
        &self.credentials
    }

    /// One join attempt of the current round. A new round starts only
    /// [`RECONNECT_SPACING_MS`] after the previous one started.
    fn try_join(&mut self, now_ms: u64) -> bool {
        if !self.credentials.is_configured() {
            return false;
        }
        if self.round_attempts == 0 {
            if let Some(last) = self.last_round {
                if now_ms.saturating_sub(last) < RECONNECT_SPACING_MS {
                    return false;
                }
            }
            self.last_round = Some(now_ms);
            info!("Establishing WiFi connection to {}", self.credentials.network_name);
        }
        self.round_attempts += 1;
        let attempt = self.round_attempts;
        if attempt >= CONNECT_ATTEMPTS {
            self.round_attempts = 0;
        }

        match self.radio.join(&self.credentials) {
            Ok(()) if self.radio.is_joined() => {
                self.round_attempts = 0;
                info!(
                    "WiFi connection established - IP address: {}",
                    self.local_address()
                );
                true
            }
            Ok(()) => {
                debug!("Join attempt {}/{} not completed", attempt, CONNECT_ATTEMPTS);
                false
            }
            Err(e) => {
                warn!("Join attempt {}/{} failed: {}", attempt, CONNECT_ATTEMPTS, e);
                false
            }
        }
    }
}

impl<R: WifiRadio, H: HttpClient> NetworkTransport for StationAndAccessPoint<R, H> {
    fn is_connected(&mut self, now_ms: u64) -> bool {
        let connected = self.radio.is_joined() || self.try_join(now_ms);
        self.state = if connected {
            ConnectivityState::Connected
        } else if self.access_point_active {
            ConnectivityState::AccessPointOnly
        } else {
            ConnectivityState::Disconnected
        };
        connected
    }

    fn connectivity(&self) -> ConnectivityState {
        self.state
    }

    fn local_address(&self) -> Ipv4Addr {
        self.radio
            .station_address()
            .unwrap_or_else(|| self.radio.access_point_address())
    }

    fn hardware_identity(&self) -> DeviceIdentity {
        self.radio.hardware_identity()
    }

    fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError> {
        if !self.radio.is_joined() {
            return Err(TransportError::NotConnected);
        }
        self.http.post(request)
    }

    fn uses_credentials(&self) -> bool {
        true
    }

    fn access_point_active(&self) -> bool {
        self.access_point_active
    }

    fn disable_access_point(&mut self) {
        match self.radio.stop_access_point() {
            Ok(()) => {
                info!("Turned off access point");
                self.access_point_active = false;
            }
            Err(e) => warn!("Failed to turn off access point: {}", e),
        }
    }
}

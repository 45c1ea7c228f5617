//! Network transports.
//!
//! Exactly one transport is built into a firmware image:
//! - [`StationAndAccessPoint`]: Wi-Fi station plus an always-on local access point
//! - [`WiredWithLease`]: Ethernet with a DHCP lease
//!
//! Both wrap a platform link (radio or Ethernet interface) and a platform
//! [`HttpClient`] behind the common [`NetworkTransport`] contract.

mod station;
mod wired;

pub use station::{StationAndAccessPoint, WifiRadio, CONNECT_ATTEMPTS, RECONNECT_SPACING_MS};
pub use wired::{EthernetInterface, LeaseEvent, LinkStatus, WiredWithLease};

use sensorcentral_core::{ConnectivityState, DeviceIdentity};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors raised while talking to the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    /// Could not reach the remote host or join the network.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The exchange started but did not complete.
    #[error("I/O error: {0}")]
    Io(String),

    /// The response could not be understood.
    #[error("Malformed HTTP response: {0}")]
    Http(String),

    /// Platform driver failure.
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Conditions that end boot. The firmware halts on these instead of restarting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootError {
    #[error("No network hardware found")]
    NoNetworkHardware,

    #[error("No network link present")]
    NoLink,
}

/// An outgoing HTTP POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpPost {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpPost {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Platform HTTP client used by a transport.
pub trait HttpClient {
    fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError>;
}

/// Connectivity and request primitives consulted by the main loop.
pub trait NetworkTransport {
    /// Whether upstream traffic is possible.
    ///
    /// May attempt a reconnect as a side effect; any wait this causes is bounded.
    fn is_connected(&mut self, now_ms: u64) -> bool;

    /// State derived by the last [`is_connected`](NetworkTransport::is_connected) call.
    fn connectivity(&self) -> ConnectivityState;

    fn local_address(&self) -> Ipv4Addr;

    /// Six-byte identity, used as device ID and name seed.
    fn hardware_identity(&self) -> DeviceIdentity;

    fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError>;

    /// Whether the transport keeps network credentials (station mode).
    fn uses_credentials(&self) -> bool {
        false
    }

    fn access_point_active(&self) -> bool {
        false
    }

    fn disable_access_point(&mut self) {}
}

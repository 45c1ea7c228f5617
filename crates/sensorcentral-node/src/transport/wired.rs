//! Wired Ethernet with a DHCP lease.
//!
//! Boot fails when the interface or its link is missing once the first lease
//! request has failed; the firmware halts
//! in that case because it has no other way to reach the network. After boot
//! `is_connected` only maintains the lease and never waits for the link.

use super::{BootError, HttpClient, HttpPost, HttpReply, NetworkTransport, TransportError};
use sensorcentral_core::{ConnectivityState, DeviceIdentity};
use std::net::Ipv4Addr;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
    NoHardware,
}

/// Outcome of one lease maintenance step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseEvent {
    Unchanged,
    Renewed(Ipv4Addr),
    Failed,
}

/// Platform Ethernet interface.
pub trait EthernetInterface {
    fn hardware_identity(&self) -> DeviceIdentity;

    fn link_status(&self) -> LinkStatus;

    /// Start the interface and request a first lease.
    fn begin(&mut self) -> Result<(), TransportError>;

    /// Renew or rebind the lease when it is due. Never waits for the link.
    fn maintain_lease(&mut self) -> LeaseEvent;

    fn address(&self) -> Option<Ipv4Addr>;
}

pub struct WiredWithLease<E: EthernetInterface, H: HttpClient> {
    interface: E,
    http: H,
    state: ConnectivityState,
}

impl<E: EthernetInterface, H: HttpClient> WiredWithLease<E, H> {
    /// Bring the interface up once.
    ///
    /// The link is only inspected when no lease could be obtained: a missing
    /// interface or cable ends boot, any other DHCP failure only warns.
    pub fn boot(mut interface: E, http: H) -> Result<Self, BootError> {
        let state = match interface.begin() {
            Ok(()) => {
                info!(
                    "Ethernet up - IP address: {}",
                    interface.address().unwrap_or(Ipv4Addr::UNSPECIFIED)
                );
                ConnectivityState::Connected
            }
            Err(e) => {
                match interface.link_status() {
                    LinkStatus::NoHardware => {
                        error!("Ethernet hardware was not found, can't run without it");
                        return Err(BootError::NoNetworkHardware);
                    }
                    LinkStatus::Down => {
                        error!("Ethernet cable is not connected");
                        return Err(BootError::NoLink);
                    }
                    LinkStatus::Up => {}
                }
                warn!("Failed to configure Ethernet using DHCP: {}", e);
                ConnectivityState::Disconnected
            }
        };

        Ok(Self {
            interface,
            http,
            state,
        })
    }

    pub fn interface(&self) -> &E {
        &self.interface
    }
}

impl<E: EthernetInterface, H: HttpClient> NetworkTransport for WiredWithLease<E, H> {
    fn is_connected(&mut self, _now_ms: u64) -> bool {
        let connected = match self.interface.maintain_lease() {
            LeaseEvent::Unchanged => self.interface.address().is_some(),
            LeaseEvent::Renewed(ip) => {
                info!("Received new DHCP address: {}", ip);
                true
            }
            LeaseEvent::Failed => {
                warn!("DHCP lease maintenance failed");
                false
            }
        } && self.interface.link_status() == LinkStatus::Up;

        self.state = if connected {
            ConnectivityState::Connected
        } else {
            ConnectivityState::Disconnected
        };
        connected
    }

    fn connectivity(&self) -> ConnectivityState {
        self.state
    }

    fn local_address(&self) -> Ipv4Addr {
        self.interface.address().unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    fn hardware_identity(&self) -> DeviceIdentity {
        self.interface.hardware_identity()
    }

    fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError> {
        self.http.post(request)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::RecordingClient;
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    struct MockInterface {
        link: LinkStatus,
        /// Link state once `begin` has started the interface.
        link_after_begin: LinkStatus,
        lease_available: bool,
        address: Option<Ipv4Addr>,
        events: Rc<RefCell<VecDeque<LeaseEvent>>>,
        maintained: Rc<RefCell<u32>>,
    }

    impl MockInterface {
        fn new(link: LinkStatus) -> Self {
            Self {
                link,
                link_after_begin: link,
                lease_available: link == LinkStatus::Up,
                address: None,
                events: Rc::default(),
                maintained: Rc::default(),
            }
        }
    }

    impl EthernetInterface for MockInterface {
        fn hardware_identity(&self) -> DeviceIdentity {
            DeviceIdentity([0xDE, 0xAD, 0xBE, 0xEF, 0xFE, 0xED])
        }

        fn link_status(&self) -> LinkStatus {
            self.link
        }

        fn begin(&mut self) -> Result<(), TransportError> {
            self.link = self.link_after_begin;
            if !self.lease_available {
                return Err(TransportError::Connect("DHCP timeout".to_string()));
            }
            self.address = Some(Ipv4Addr::new(10, 0, 0, 7));
            Ok(())
        }

        fn maintain_lease(&mut self) -> LeaseEvent {
            *self.maintained.borrow_mut() += 1;
            let event = self.events.borrow_mut().pop_front().unwrap_or(LeaseEvent::Unchanged);
            if let LeaseEvent::Renewed(ip) = event {
                self.address = Some(ip);
            }
            event
        }

        fn address(&self) -> Option<Ipv4Addr> {
            self.address
        }
    }

    #[test]
    fn test_missing_hardware_ends_boot() {
        let result = WiredWithLease::boot(MockInterface::new(LinkStatus::NoHardware), RecordingClient::default());
        assert_eq!(result.err(), Some(BootError::NoNetworkHardware));
    }

    #[test]
    fn test_missing_link_ends_boot() {
        let result = WiredWithLease::boot(MockInterface::new(LinkStatus::Down), RecordingClient::default());
        assert_eq!(result.err(), Some(BootError::NoLink));
    }

    #[test]
    fn test_link_reported_only_after_begin() {
        // A stopped driver reports no link until the interface is started
        let mut interface = MockInterface::new(LinkStatus::Down);
        interface.link_after_begin = LinkStatus::Up;
        interface.lease_available = true;

        let transport = WiredWithLease::boot(interface, RecordingClient::default()).unwrap();
        assert_eq!(transport.connectivity(), ConnectivityState::Connected);
        assert_eq!(transport.local_address(), Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn test_dhcp_failure_with_link_only_warns() {
        let mut interface = MockInterface::new(LinkStatus::Up);
        interface.lease_available = false;

        let transport = WiredWithLease::boot(interface, RecordingClient::default()).unwrap();
        assert_eq!(transport.connectivity(), ConnectivityState::Disconnected);
        assert_eq!(transport.local_address(), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_lease_maintained_every_check() {
        let interface = MockInterface::new(LinkStatus::Up);
        let maintained = interface.maintained.clone();
        let events = interface.events.clone();
        let mut transport = WiredWithLease::boot(interface, RecordingClient::default()).unwrap();
        assert_eq!(transport.local_address(), Ipv4Addr::new(10, 0, 0, 7));

        events.borrow_mut().extend([
            LeaseEvent::Unchanged,
            LeaseEvent::Renewed(Ipv4Addr::new(10, 0, 0, 9)),
            LeaseEvent::Failed,
        ]);
        assert!(transport.is_connected(0));
        assert!(transport.is_connected(1));
        assert_eq!(transport.local_address(), Ipv4Addr::new(10, 0, 0, 9));
        assert!(!transport.is_connected(2));
        assert_eq!(transport.connectivity(), ConnectivityState::Disconnected);
        assert_eq!(*maintained.borrow(), 3);
        assert!(!transport.uses_credentials());
    }
}

//! Ethernet interface over an RMII PHY.
//!
//! DHCP runs inside the ESP-IDF netif, so lease maintenance only reports
//! address changes observed since the previous call. The link state is only
//! meaningful once `begin` has started the driver.

use crate::describe;
use esp_idf_svc::eth::{EspEth, RmiiEth};
use esp_idf_svc::hal::delay::FreeRtos;
use log::warn;
use sensorcentral_core::DeviceIdentity;
use sensorcentral_node::transport::{EthernetInterface, LeaseEvent, LinkStatus};
use sensorcentral_node::TransportError;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// How long `begin` waits for the first DHCP lease.
const LEASE_WAIT: Duration = Duration::from_secs(15);

const LEASE_POLL_MS: u32 = 100;

pub struct EthernetPort {
    eth: Option<EspEth<'static, RmiiEth>>,
    identity: DeviceIdentity,
    address: Option<Ipv4Addr>,
}

impl EthernetPort {
    /// `eth` is `None` when the PHY could not be brought up.
    pub fn new(eth: Option<EspEth<'static, RmiiEth>>) -> Self {
        let identity = eth
            .as_ref()
            .and_then(|eth| eth.netif().get_mac().ok())
            .map(DeviceIdentity)
            .unwrap_or_default();
        Self {
            eth,
            identity,
            address: None,
        }
    }

    fn current_address(&self) -> Option<Ipv4Addr> {
        let eth = self.eth.as_ref()?;
        let ip_info = eth.netif().get_ip_info().ok()?;
        Some(ip_info.ip).filter(|ip| !ip.is_unspecified())
    }
}

impl EthernetInterface for EthernetPort {
    fn hardware_identity(&self) -> DeviceIdentity {
        self.identity
    }

    fn link_status(&self) -> LinkStatus {
        let Some(eth) = &self.eth else {
            return LinkStatus::NoHardware;
        };
        match eth.is_connected() {
            Ok(true) => LinkStatus::Up,
            Ok(false) => LinkStatus::Down,
            Err(e) => {
                warn!("Failed to query Ethernet link: {:?}", e);
                LinkStatus::Down
            }
        }
    }

    fn begin(&mut self) -> Result<(), TransportError> {
        let eth = self
            .eth
            .as_mut()
            .ok_or_else(|| TransportError::Driver("Ethernet PHY missing".into()))?;
        eth.start().map_err(|e| TransportError::Driver(describe(e)))?;

        let started = Instant::now();
        while started.elapsed() < LEASE_WAIT {
            if let Some(ip) = self.current_address() {
                self.address = Some(ip);
                return Ok(());
            }
            FreeRtos::delay_ms(LEASE_POLL_MS);
        }
        Err(TransportError::Connect(format!(
            "no DHCP lease within {:?}",
            LEASE_WAIT
        )))
    }

    fn maintain_lease(&mut self) -> LeaseEvent {
        match self.current_address() {
            Some(ip) if Some(ip) != self.address => {
                self.address = Some(ip);
                LeaseEvent::Renewed(ip)
            }
            Some(_) => LeaseEvent::Unchanged,
            None if self.address.is_some() => {
                self.address = None;
                LeaseEvent::Failed
            }
            None => LeaseEvent::Unchanged,
        }
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }
}

//! Wi-Fi radio for ESP32.
//!
//! Runs the station and the access point side by side (`Configuration::Mixed`).
//! The access point is open and its name comes from the node. A join issues
//! the connect request and waits at most [`JOIN_WAIT`] for the station
//! netif; a slower association finishes in the background.

use crate::describe;
use anyhow::Result;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{delay::FreeRtos, peripheral},
    nvs::EspDefaultNvsPartition,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    },
};
use log::{info, warn};
use sensorcentral_core::{DeviceIdentity, NetworkCredentials};
use sensorcentral_node::transport::WifiRadio;
use sensorcentral_node::TransportError;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// ESP-IDF default soft-AP address, reported until the AP netif has one.
const DEFAULT_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 71, 1);

/// Access point channel.
const AP_CHANNEL: u8 = 1;

/// Longest a single join keeps the main loop away from queued web requests.
const JOIN_WAIT: Duration = Duration::from_secs(5);

const JOIN_POLL_MS: u32 = 100;

pub struct EspRadio {
    wifi: BlockingWifi<EspWifi<'static>>,
    identity: DeviceIdentity,
    client: ClientConfiguration,
    access_point: Option<AccessPointConfiguration>,
}

impl EspRadio {
    /// Take the modem. The radio stays stopped until the access point starts.
    pub fn new(
        modem: impl peripheral::Peripheral<P = esp_idf_svc::hal::modem::Modem> + 'static,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let identity = DeviceIdentity(esp_wifi.sta_netif().get_mac()?);
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self {
            wifi,
            identity,
            client: ClientConfiguration::default(),
            access_point: None,
        })
    }

    fn configuration(&self) -> Configuration {
        match &self.access_point {
            Some(ap) => Configuration::Mixed(self.client.clone(), ap.clone()),
            None => Configuration::Client(self.client.clone()),
        }
    }

    fn apply(&mut self) -> Result<(), TransportError> {
        let configuration = self.configuration();
        self.wifi
            .set_configuration(&configuration)
            .map_err(|e| TransportError::Driver(describe(e)))?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi
                .start()
                .map_err(|e| TransportError::Driver(describe(e)))?;
        }
        Ok(())
    }
}

impl WifiRadio for EspRadio {
    fn hardware_identity(&self) -> DeviceIdentity {
        self.identity
    }

    fn start_access_point(&mut self, network_name: &str) -> Result<(), TransportError> {
        let ssid = network_name
            .try_into()
            .map_err(|_| TransportError::Driver(format!("AP name too long: {}", network_name)))?;
        self.access_point = Some(AccessPointConfiguration {
            ssid,
            auth_method: AuthMethod::None,
            channel: AP_CHANNEL,
            ..Default::default()
        });
        self.apply()
    }

    fn stop_access_point(&mut self) -> Result<(), TransportError> {
        self.access_point = None;
        self.apply()
    }

    fn join(&mut self, credentials: &NetworkCredentials) -> Result<(), TransportError> {
        let auth_method = if credentials.network_password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let client = ClientConfiguration {
            ssid: credentials
                .network_name
                .as_str()
                .try_into()
                .map_err(|_| TransportError::Connect("SSID too long (max 32 chars)".into()))?,
            password: credentials
                .network_password
                .as_str()
                .try_into()
                .map_err(|_| TransportError::Connect("Password too long (max 64 chars)".into()))?,
            auth_method,
            ..Default::default()
        };
        // Reconfiguring aborts an association that is still in progress
        if client != self.client {
            self.client = client;
            self.apply()?;
        }

        info!("Connecting to '{}'...", credentials.network_name);
        if let Err(e) = self.wifi.wifi_mut().connect() {
            warn!("Connect request not accepted: {:?}", e);
        }

        let started = Instant::now();
        while started.elapsed() < JOIN_WAIT {
            if self.wifi.is_up().unwrap_or(false) {
                return Ok(());
            }
            FreeRtos::delay_ms(JOIN_POLL_MS);
        }
        Err(TransportError::Connect(format!(
            "no DHCP lease within {:?}",
            JOIN_WAIT
        )))
    }

    fn is_joined(&self) -> bool {
        match self.wifi.is_connected() {
            Ok(connected) => connected,
            Err(e) => {
                warn!("Failed to query station state: {:?}", e);
                false
            }
        }
    }

    fn station_address(&self) -> Option<Ipv4Addr> {
        let ip_info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        Some(ip_info.ip).filter(|ip| !ip.is_unspecified())
    }

    fn access_point_address(&self) -> Ipv4Addr {
        self.wifi
            .wifi()
            .ap_netif()
            .get_ip_info()
            .map(|ip_info| ip_info.ip)
            .unwrap_or(DEFAULT_AP_ADDRESS)
    }
}

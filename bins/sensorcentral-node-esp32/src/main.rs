//! SensorCentral sensor node firmware for ESP32.
//!
//! This binary requires the ESP32 Rust toolchain.
//!
//! The transport is chosen at build time: the default `wifi` feature runs a
//! station plus a local access point, `ethernet` (with
//! `--no-default-features --features std,esp-idf-svc/native,ethernet`) uses an
//! RMII PHY in the WT32-ETH01 layout.
//!
//! Pins:
//! - 1-Wire buses: GPIO14, GPIO15
//! - DHT22: GPIO4
//! - Binary switch: GPIO39
//! - Watchdog pat line: GPIO32, print LED: GPIO33, HTTP LED: GPIO2

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};
use sensorcentral_core::{select_backend, ConfigStore, SensorHardware};
use sensorcentral_esp32::hardware::{BoardIndicators, Dht22Port, OneWirePort, SwitchPin};
use sensorcentral_esp32::http::{self, EspClient};
use sensorcentral_esp32::storage::NvsRegion;
use sensorcentral_node::{
    log_boot_settings, BootError, Clock, LoopControl, NetworkTransport, Node, SystemClock,
};
use std::sync::mpsc;

#[cfg(all(feature = "wifi", feature = "ethernet"))]
compile_error!("features `wifi` and `ethernet` are mutually exclusive");

#[cfg(not(any(feature = "wifi", feature = "ethernet")))]
compile_error!("enable one of the `wifi` or `ethernet` features");

/// Main loop pacing; short against the 200 ms settle window.
const LOOP_DELAY_MS: u32 = 10;

/// Time for the restart page to leave the socket before rebooting.
const RESTART_DELAY_MS: u32 = 500;

const HALT_HEARTBEAT_MS: u32 = 10_000;

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let pins = peripherals.pins;

    let mut store = ConfigStore::new(NvsRegion::open(nvs.clone())?);
    let config = store.load_configuration();
    let credentials = store.load_credentials();
    log_boot_settings(&config, cfg!(feature = "wifi").then_some(&credentials));

    let clock = SystemClock::new();
    let (tx, rx) = mpsc::channel();

    // The server needs the driver's netif but must not wait for the transport
    // to boot; requests queue until the main loop runs
    #[cfg(feature = "wifi")]
    let (booted, _server) = {
        use sensorcentral_esp32::wifi::EspRadio;
        use sensorcentral_node::transport::StationAndAccessPoint;

        let radio = EspRadio::new(peripherals.modem, sysloop.clone(), nvs)?;
        let server = http::start_server(tx)?;
        let booted = StationAndAccessPoint::boot(radio, EspClient, credentials.clone(), clock.now_ms());
        (booted, server)
    };

    #[cfg(feature = "ethernet")]
    let (booted, _server) = {
        use esp_idf_svc::eth::{EspEth, EthDriver, RmiiClockConfig, RmiiEthChipset};
        use esp_idf_svc::hal::gpio;
        use sensorcentral_esp32::ethernet::EthernetPort;
        use sensorcentral_node::transport::WiredWithLease;

        let driver = EthDriver::new_rmii(
            peripherals.mac,
            pins.gpio25,
            pins.gpio26,
            pins.gpio27,
            pins.gpio23,
            pins.gpio22,
            pins.gpio21,
            pins.gpio19,
            pins.gpio18,
            RmiiClockConfig::<gpio::Gpio0, gpio::Gpio16, gpio::Gpio17>::Input(pins.gpio0),
            Some(pins.gpio16),
            RmiiEthChipset::LAN87XX,
            Some(1),
            sysloop.clone(),
        );
        let eth = match driver.and_then(EspEth::wrap) {
            Ok(eth) => Some(eth),
            Err(e) => {
                error!("Ethernet PHY not available: {:?}", e);
                None
            }
        };
        let server = http::start_server(tx)?;
        (WiredWithLease::boot(EthernetPort::new(eth), EspClient), server)
    };

    let transport = match booted {
        Ok(transport) => transport,
        Err(e) => halt(e),
    };

    let identity = transport.hardware_identity();
    let hardware = SensorHardware {
        probe_buses: vec![
            Box::new(OneWirePort::new(pins.gpio14.into(), "GPIO14")),
            Box::new(OneWirePort::new(pins.gpio15.into(), "GPIO15")),
        ],
        climate: Some(Box::new(Dht22Port::new(pins.gpio4.into(), "GPIO4"))),
        switch: Some(Box::new(SwitchPin::new(pins.gpio39.into(), "GPIO39"))),
    };
    let backend = select_backend(&config.sensor_type, &identity, hardware);
    let indicators = BoardIndicators::new(pins.gpio32.into(), pins.gpio33.into(), pins.gpio2.into())?;

    let mut node = Node::new(transport, store, config, Some(credentials), backend, clock)
        .with_indicators(Box::new(indicators))
        .with_requests(Box::new(rx));

    info!("Entering main loop");
    loop {
        if node.tick() == LoopControl::Restart {
            FreeRtos::delay_ms(RESTART_DELAY_MS);
            info!("Restarting");
            unsafe { esp_idf_svc::sys::esp_restart() };
        }
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}

/// Without a network there is nothing to do but wait for a power cycle.
fn halt(e: BootError) -> ! {
    loop {
        warn!("Halted: {}", e);
        FreeRtos::delay_ms(HALT_HEARTBEAT_MS);
    }
}

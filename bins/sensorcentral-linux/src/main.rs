//! SensorCentral node simulator.
//!
//! Runs the node main loop on the host with simulated sensors and the
//! host's own network as a wired link. Settings persist in a state file,
//! and the configuration pages are served over HTTP.
//!
//! Environment:
//! - `SENSORCENTRAL_STATE` - state file (default `sensorcentral-state.bin`)
//! - `SENSORCENTRAL_HTTP` - web server address (default `0.0.0.0:8080`)
//! - `SENSORCENTRAL_SENSOR` - sensor type written into a fresh state file
//!   (default `DS18B20`)

mod link;
mod sim;
mod web;

use link::{HostLink, RawHttpClient};
use sensorcentral_core::{select_backend, ConfigStore, DeviceIdentity};
use sensorcentral_node::transport::WiredWithLease;
use sensorcentral_node::{
    log_boot_settings, InboundRequest, LoopControl, Node, RequestSource, SystemClock,
};
use sim::FileRegion;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Locally administered address for the simulated board.
const SIMULATED_IDENTITY: DeviceIdentity = DeviceIdentity([0x02, 0x53, 0x43, 0x00, 0x00, 0x01]);

const TICK: Duration = Duration::from_millis(1);
const HALT_HEARTBEAT: Duration = Duration::from_secs(10);
const HALT_POLL: Duration = Duration::from_millis(100);

struct Settings {
    state_file: PathBuf,
    http_addr: SocketAddr,
    sensor_type: String,
}

impl Settings {
    fn from_env() -> anyhow::Result<Self> {
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.into());
        Ok(Self {
            state_file: var("SENSORCENTRAL_STATE", "sensorcentral-state.bin").into(),
            http_addr: var("SENSORCENTRAL_HTTP", "0.0.0.0:8080").parse()?,
            sensor_type: var("SENSORCENTRAL_SENSOR", "DS18B20"),
        })
    }
}

/// Request queue shared by every boot of the node.
struct RequestQueue(Rc<Receiver<InboundRequest>>);

impl RequestSource for RequestQueue {
    fn try_next(&mut self) -> Option<InboundRequest> {
        self.0.try_recv().ok()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sensorcentral_node=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "SensorCentral simulator {} starting...",
        sensorcentral_protocol::PRODUCT_VERSION
    );
    let settings = Settings::from_env()?;

    let (tx, rx) = mpsc::channel();
    let listener = tokio::net::TcpListener::bind(settings.http_addr).await?;
    tracing::info!("Configuration pages on http://{}/", settings.http_addr);
    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, web::router(tx)).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    let stop = Arc::new(AtomicBool::new(false));
    let node_stop = stop.clone();
    let node_handle = tokio::task::spawn_blocking(move || run_node(&settings, rx, &node_stop));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        result = node_handle => {
            match result {
                Ok(Err(e)) => tracing::error!("Node stopped: {:#}", e),
                Err(e) => tracing::error!("Node task failed: {}", e),
                Ok(Ok(())) => tracing::warn!("Node stopped"),
            }
        }
    }

    stop.store(true, Ordering::Relaxed);
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Boot the node, run it, and boot again whenever it asks for a restart.
fn run_node(settings: &Settings, rx: Receiver<InboundRequest>, stop: &AtomicBool) -> anyhow::Result<()> {
    let requests = Rc::new(rx);
    let mut region = FileRegion::open(&settings.state_file)?;
    tracing::info!("State file: {}", region.path().display());

    loop {
        let fresh = region.is_fresh();
        let mut store = ConfigStore::new(region);
        let mut config = store.load_configuration();
        if fresh {
            config.sensor_type = settings.sensor_type.clone();
            store.save_configuration(&config)?;
        }
        log_boot_settings(&config, None);

        let transport = match WiredWithLease::boot(HostLink::new(SIMULATED_IDENTITY), RawHttpClient) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!("Boot failed: {}", e);
                halt(stop);
                return Ok(());
            }
        };
        let backend = select_backend(
            &config.sensor_type,
            &SIMULATED_IDENTITY,
            sim::simulated_hardware(),
        );

        let mut node = Node::new(transport, store, config, None, backend, SystemClock::new())
            .with_requests(Box::new(RequestQueue(requests.clone())));

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            if node.tick() == LoopControl::Restart {
                break;
            }
            std::thread::sleep(TICK);
        }

        tracing::info!("Restarting node");
        region = node.into_region();
    }
}

/// Boot failures leave the node idle, as the board would.
fn halt(stop: &AtomicBool) {
    let mut idle = HALT_HEARTBEAT;
    while !stop.load(Ordering::Relaxed) {
        if idle >= HALT_HEARTBEAT {
            tracing::warn!("Node halted");
            idle = Duration::ZERO;
        }
        std::thread::sleep(HALT_POLL);
        idle += HALT_POLL;
    }
}

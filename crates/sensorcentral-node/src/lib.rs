//! # sensorcentral-node
//!
//! Node runtime for SensorCentral sensor nodes.
//!
//! This crate provides:
//! - Network transports (Wi-Fi station with access point, wired Ethernet)
//! - The telemetry client posting readings to a collector
//! - The configuration web handler and its pages
//! - The cooperative main loop and its start/settle timers
//!
//! Platform specifics (radios, HTTP clients, pins, flash) come in through
//! traits, so the same loop runs on the ESP32 and in the Linux simulator.

pub mod console;
pub mod node;
pub mod pages;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod transport;
pub mod web;

pub use console::{Console, IndicatorPins, NoIndicators, StdoutConsole};
pub use node::{log_boot_settings, LoopControl, Node, ACCESS_POINT_WINDOW_MS};
pub use scheduler::{Clock, ManualClock, SystemClock, SETTLE_MS};
pub use state::AppState;
pub use telemetry::TelemetryClient;
pub use transport::{
    BootError, HttpClient, HttpPost, HttpReply, NetworkTransport, TransportError,
};
pub use web::{InboundRequest, Method, RequestSource, WebRequest, WebResponse};

//! The main loop.
//!
//! [`Node::tick`] runs one non-blocking iteration. Within an iteration the
//! checks run in a fixed order:
//!
//! 1. access point window expiry
//! 2. one inbound web request
//! 3. connectivity (when down, the remaining periodic activities are skipped)
//! 4. boot announcement, once
//! 5. sensor poll start/settle
//! 6. console print start/settle
//! 7. telemetry post start/settle
//!
//! The node is the only writer of [`AppState`]; web requests are handled
//! synchronously inside step 2.

use crate::console::{Console, IndicatorPins, NoIndicators, StdoutConsole};
use crate::pages::mask_token;
use crate::scheduler::{Clock, PeriodicActivity, SETTLE_MS};
use crate::state::AppState;
use crate::telemetry::TelemetryClient;
use crate::transport::NetworkTransport;
use crate::web::{ConfigWebServer, NoRequests, RequestSource};
use sensorcentral_core::{
    ConfigStore, Configuration, DurableRegion, NetworkCredentials, SensorBackend,
};
use sensorcentral_protocol::{LAST_CHANGE, PRODUCT_VERSION};
use tracing::{debug, info, warn};

/// Time after boot when the local access point is turned off, unless pinned.
pub const ACCESS_POINT_WINDOW_MS: u64 = 300_000;

const PRINT_SEPARATOR: &str = "--------------------";

/// What the platform should do after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// Settings were persisted; reboot so they take effect.
    Restart,
}

/// Log the settings a node boots with. The token is masked.
pub fn log_boot_settings(config: &Configuration, credentials: Option<&NetworkCredentials>) {
    info!("Version: {}", PRODUCT_VERSION);
    info!("Last change: {}", LAST_CHANGE);
    info!(
        "Delays - print: {}ms, poll: {}ms, post: {}ms",
        config.print_interval_ms, config.poll_interval_ms, config.post_interval_ms
    );
    info!("Endpoint: {}", config.endpoint);
    info!("JWT: {}", mask_token(&config.token));
    info!("Sensor type: {}", config.sensor_type);
    if let Some(credentials) = credentials {
        info!(
            "SSID: {}, password: ****, keep AP on: {}",
            credentials.network_name, credentials.keep_access_point_on
        );
    }
}

pub struct Node<T: NetworkTransport, R: DurableRegion, C: Clock> {
    transport: T,
    store: ConfigStore<R>,
    clock: C,
    backend: Box<dyn SensorBackend>,
    console: Box<dyn Console>,
    indicators: Box<dyn IndicatorPins>,
    requests: Box<dyn RequestSource>,
    state: AppState,
    boot_ms: u64,
    access_point_window_closed: bool,
    announced: bool,
    poll: PeriodicActivity,
    print: PeriodicActivity,
    post: PeriodicActivity,
}

impl<T: NetworkTransport, R: DurableRegion, C: Clock> Node<T, R, C> {
    /// Assemble a booted node. Timers start counting from the clock's current time.
    ///
    /// `credentials` is only kept when the transport uses them.
    pub fn new(
        transport: T,
        store: ConfigStore<R>,
        config: Configuration,
        credentials: Option<NetworkCredentials>,
        backend: Box<dyn SensorBackend>,
        clock: C,
    ) -> Self {
        let identity = transport.hardware_identity();
        let credentials = credentials.filter(|_| transport.uses_credentials());
        let now = clock.now_ms();
        info!("MAC address: {}", identity);

        let mut state = AppState::new(config, credentials, identity);
        state.local_address = transport.local_address();
        state.connectivity = transport.connectivity();
        let config = &state.config;

        Self {
            poll: PeriodicActivity::new(u64::from(config.poll_interval_ms), SETTLE_MS, now),
            print: PeriodicActivity::new(u64::from(config.print_interval_ms), SETTLE_MS, now),
            post: PeriodicActivity::new(u64::from(config.post_interval_ms), SETTLE_MS, now),
            transport,
            store,
            clock,
            backend,
            console: Box::new(StdoutConsole),
            indicators: Box::new(NoIndicators),
            requests: Box::new(NoRequests),
            state,
            boot_ms: now,
            access_point_window_closed: false,
            announced: false,
        }
    }

    pub fn with_console(mut self, console: Box<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_indicators(mut self, indicators: Box<dyn IndicatorPins>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn with_requests(mut self, requests: Box<dyn RequestSource>) -> Self {
        self.requests = requests;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn backend(&self) -> &dyn SensorBackend {
        self.backend.as_ref()
    }

    /// Give back the durable region, e.g. to boot again from it.
    pub fn into_region(self) -> R {
        self.store.into_region()
    }

    /// Run one iteration of the main loop.
    pub fn tick(&mut self) -> LoopControl {
        let now = self.clock.now_ms();
        self.expire_access_point(now);

        if self.service_request() == LoopControl::Restart {
            return LoopControl::Restart;
        }

        let connected = self.transport.is_connected(now);
        self.track_connectivity();
        // Reconnecting may have taken a while
        let now = self.clock.now_ms();

        if !connected {
            self.release_indicators(now);
            return LoopControl::Continue;
        }

        self.announce_boot();
        self.run_poll(now);
        self.run_print(now);
        self.run_post(now);
        LoopControl::Continue
    }

    fn expire_access_point(&mut self, now: u64) {
        if self.access_point_window_closed
            || now.saturating_sub(self.boot_ms) < ACCESS_POINT_WINDOW_MS
        {
            return;
        }
        self.access_point_window_closed = true;

        if !self.transport.access_point_active() {
            return;
        }
        if self.state.keep_access_point_on() {
            info!("Access point window elapsed, keeping access point on as configured");
        } else {
            info!("Access point window elapsed, turning off access point");
            self.transport.disable_access_point();
        }
    }

    fn service_request(&mut self) -> LoopControl {
        let Some(inbound) = self.requests.try_next() else {
            return LoopControl::Continue;
        };
        debug!("{:?} {}", inbound.request.method, inbound.request.path);

        let response = ConfigWebServer {
            state: &mut self.state,
            store: &mut self.store,
            snapshot: self.backend.snapshot(),
        }
        .handle(&inbound.request);

        let restart = response.restart;
        (inbound.respond)(response);
        if restart {
            info!("Restarting to apply new settings");
            LoopControl::Restart
        } else {
            LoopControl::Continue
        }
    }

    fn track_connectivity(&mut self) {
        let connectivity = self.transport.connectivity();
        if connectivity != self.state.connectivity {
            if connectivity.is_connected() {
                info!("Network {}", connectivity);
            } else {
                warn!("Network {}", connectivity);
            }
            self.state.connectivity = connectivity;
        }
        self.state.local_address = self.transport.local_address();
    }

    /// Settle held indicators while the periodic activities are skipped.
    fn release_indicators(&mut self, now: u64) {
        if self.poll.settle_due(now) {
            self.poll.settle();
            self.indicators.watchdog(false);
        }
        if self.print.settle_due(now) {
            self.print.settle();
            self.indicators.print_led(false);
        }
        if self.post.settle_due(now) {
            self.post.settle();
            self.indicators.http_led(false);
        }
    }

    fn announce_boot(&mut self) {
        if self.announced {
            return;
        }
        self.announced = true;
        if !self.state.config.has_endpoint() {
            return;
        }

        info!("Announcing restart to {}", self.state.config.endpoint);
        let client = TelemetryClient::new(&self.state.config, self.state.identity);
        let response = client.announce_restart(&mut self.transport);
        self.state.last_response = response;
    }

    fn run_poll(&mut self, now: u64) {
        if self.poll.is_due(now) {
            self.poll.start(now);
            self.indicators.watchdog(true);
            let count = self.backend.poll().len();
            debug!("Polled {} readings", count);
        } else if self.poll.settle_due(now) {
            self.poll.settle();
            self.indicators.watchdog(false);
        }
    }

    fn run_print(&mut self, now: u64) {
        if self.print.is_due(now) {
            self.print.start(now);
            self.indicators.print_led(true);
            self.console.write_line(PRINT_SEPARATOR);
            for line in self.backend.describe().lines() {
                self.console.write_line(line);
            }
            self.console.write_line("Printed available data");
        } else if self.print.settle_due(now) {
            self.print.settle();
            self.indicators.print_led(false);
        }
    }

    fn run_post(&mut self, now: u64) {
        if self.post.is_due(now) && self.state.config.has_endpoint() {
            self.post.start(now);
            self.indicators.http_led(true);
            let client = TelemetryClient::new(&self.state.config, self.state.identity);
            let response = client.post_readings(&mut self.transport, self.backend.snapshot());
            self.state.last_response = response;
        } else if self.post.settle_due(now) {
            self.post.settle();
            self.indicators.http_led(false);
        }
    }
}

//! Configuration web surface.
//!
//! Platform HTTP servers parse requests on their own threads and forward them
//! as [`InboundRequest`]s through a [`RequestSource`]. The main loop takes at
//! most one per iteration, handles it with [`ConfigWebServer`] and replies
//! through the request's responder.
//!
//! Routes:
//! - `GET /`, `/data.html`, `/sensorconfig.html`, `/wificonfig.html`,
//!   `/httpstatus.html`, `/styles.css`
//! - `POST /sensor`: partial configuration update
//! - `POST /wifi`: network credentials update
//!
//! Any accepted update is persisted before the reply, and the reply asks for
//! a restart. New settings only take effect after that restart.

use crate::pages;
use crate::state::AppState;
use sensorcentral_core::config::ConfigurationUpdate;
use sensorcentral_core::{ConfigStore, DurableRegion, NetworkCredentials, SensorSnapshot};
use std::collections::BTreeMap;
use std::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A parsed request: method, path and form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRequest {
    pub method: Method,
    pub path: String,
    pub form: BTreeMap<String, String>,
}

impl WebRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::Get,
            path: path.to_string(),
            form: BTreeMap::new(),
        }
    }

    pub fn post(path: &str, fields: &[(&str, &str)]) -> Self {
        Self {
            method: Method::Post,
            path: path.to_string(),
            form: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &str) -> BTreeMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (url_decode(k), url_decode(v)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

fn url_decode(text: &str) -> String {
    let hex = |b: Option<&u8>| b.and_then(|b| char::from(*b).to_digit(16)).map(|d| d as u8);
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => match (hex(bytes.get(i + 1)), hex(bytes.get(i + 2))) {
                (Some(high), Some(low)) => {
                    out.push(high << 4 | low);
                    i += 2;
                }
                _ => out.push(b'%'),
            },
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    /// Restart the node once this response is sent.
    pub restart: bool,
}

impl WebResponse {
    fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html",
            body,
            restart: false,
        }
    }

    fn plain(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
            restart: false,
        }
    }

    fn restarting() -> Self {
        Self {
            restart: true,
            ..Self::html(pages::restarting())
        }
    }

    pub fn not_found() -> Self {
        Self::plain(404, "404: Not found")
    }
}

/// Reply callback of one request.
pub type Responder = Box<dyn FnOnce(WebResponse) + Send>;

pub struct InboundRequest {
    pub request: WebRequest,
    pub respond: Responder,
}

impl InboundRequest {
    pub fn new(request: WebRequest, respond: impl FnOnce(WebResponse) + Send + 'static) -> Self {
        Self {
            request,
            respond: Box::new(respond),
        }
    }
}

/// Non-blocking queue of requests waiting for the main loop.
pub trait RequestSource {
    fn try_next(&mut self) -> Option<InboundRequest>;
}

impl RequestSource for mpsc::Receiver<InboundRequest> {
    fn try_next(&mut self) -> Option<InboundRequest> {
        self.try_recv().ok()
    }
}

/// Board without a web server.
#[derive(Debug, Default)]
pub struct NoRequests;

impl RequestSource for NoRequests {
    fn try_next(&mut self) -> Option<InboundRequest> {
        None
    }
}

/// Request handler over the main loop's state.
pub struct ConfigWebServer<'a, R: DurableRegion> {
    pub state: &'a mut AppState,
    pub store: &'a mut ConfigStore<R>,
    pub snapshot: &'a SensorSnapshot,
}

impl<'a, R: DurableRegion> ConfigWebServer<'a, R> {
    pub fn handle(&mut self, request: &WebRequest) -> WebResponse {
        let has_credentials = self.state.credentials.is_some();
        match (request.method, request.path.as_str()) {
            (Method::Get, "/") => WebResponse::html(pages::menu()),
            (Method::Get, "/data.html") => WebResponse::html(pages::data(self.snapshot)),
            (Method::Get, "/sensorconfig.html") => {
                WebResponse::html(pages::sensor_config(self.state))
            }
            (Method::Get, "/wificonfig.html") if has_credentials => {
                WebResponse::html(pages::wifi_config(self.state))
            }
            (Method::Get, "/httpstatus.html") => {
                WebResponse::html(pages::http_status(&self.state.last_response))
            }
            (Method::Get, "/styles.css") => WebResponse {
                content_type: "text/css",
                ..WebResponse::html(pages::STYLES.to_string())
            },
            (Method::Post, "/sensor") => self.update_configuration(request),
            (Method::Post, "/wifi") if has_credentials => self.update_credentials(request),
            _ => WebResponse::not_found(),
        }
    }

    fn update_configuration(&mut self, request: &WebRequest) -> WebResponse {
        info!("Received POST for sensor config");
        let interval = |name: &str| request.field(name).and_then(|v| v.trim().parse::<u32>().ok());
        let text = |name: &str| request.field(name).map(str::to_string);
        let update = ConfigurationUpdate {
            print_interval_ms: interval("print"),
            poll_interval_ms: interval("poll"),
            post_interval_ms: interval("post"),
            endpoint: text("endpoint"),
            token: text("jwt"),
            sensor_type: text("sensortype"),
        };

        let mut config = self.state.config.clone();
        if !update.apply_to(&mut config) {
            return WebResponse::plain(400, "400: No settings to update");
        }
        if let Err(e) = self.store.save_configuration(&config) {
            warn!("Failed to persist configuration: {}", e);
            return WebResponse::plain(500, "500: Failed to save configuration");
        }

        info!(
            "Configuration updated - endpoint: {}, sensor type: {}, delays: {}/{}/{}ms",
            config.endpoint,
            config.sensor_type,
            config.print_interval_ms,
            config.poll_interval_ms,
            config.post_interval_ms
        );
        self.state.config = config;
        WebResponse::restarting()
    }

    fn update_credentials(&mut self, request: &WebRequest) -> WebResponse {
        info!("Received POST with wifi data");
        let non_empty = |name: &str| request.field(name).filter(|v| !v.is_empty());
        let (Some(ssid), Some(password)) = (non_empty("ssid"), non_empty("password")) else {
            return WebResponse::plain(417, "417: Invalid Request");
        };
        let keep_access_point_on = request
            .field("keep_ap_on")
            .map_or(false, |v| v.starts_with('1'));

        let credentials = NetworkCredentials::new(ssid, password, keep_access_point_on);
        if let Err(e) = self.store.save_credentials(&credentials) {
            warn!("Failed to persist network credentials: {}", e);
            return WebResponse::plain(500, "500: Failed to save credentials");
        }

        info!(
            "Network credentials updated - SSID: {}, keep AP on: {}",
            credentials.network_name, credentials.keep_access_point_on
        );
        self.state.credentials = Some(credentials);
        WebResponse::restarting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sensorcentral_core::{Configuration, DeviceIdentity, MemoryRegion, StorageError};

    struct FailingRegion;

    impl DurableRegion for FailingRegion {
        fn read(&mut self, _offset: usize, _buf: &mut [u8]) -> Result<(), StorageError> {
            Err(StorageError::ReadError("flash".to_string()))
        }

        fn write(&mut self, _offset: usize, _bytes: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::WriteError("flash".to_string()))
        }

        fn commit(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn state(credentials: Option<NetworkCredentials>) -> AppState {
        AppState::new(
            Configuration::default(),
            credentials,
            DeviceIdentity([0xA4, 0xCF, 0x12, 0xD8, 0x3B, 0x01]),
        )
    }

    fn handle<R: DurableRegion>(
        state: &mut AppState,
        store: &mut ConfigStore<R>,
        request: WebRequest,
    ) -> WebResponse {
        let snapshot = SensorSnapshot::new();
        ConfigWebServer {
            state,
            store,
            snapshot: &snapshot,
        }
        .handle(&request)
    }

    #[test]
    fn test_parse_form() {
        let form = parse_form("ssid=Home+Net&password=p%40ss%26word&keep_ap_on=1&flag");
        assert_eq!(form["ssid"], "Home Net");
        assert_eq!(form["password"], "p@ss&word");
        assert_eq!(form["keep_ap_on"], "1");
        assert_eq!(form["flag"], "");
        assert_eq!(parse_form("endpoint=a%2"), BTreeMap::from([("endpoint".to_string(), "a%2".to_string())]));
    }

    #[test]
    fn test_get_routes() {
        let mut state = state(Some(NetworkCredentials::default()));
        let mut store = ConfigStore::new(MemoryRegion::new());
        for path in ["/", "/data.html", "/sensorconfig.html", "/wificonfig.html", "/httpstatus.html"] {
            let response = handle(&mut state, &mut store, WebRequest::get(path));
            assert_eq!(response.status, 200, "{}", path);
            assert_eq!(response.content_type, "text/html");
            assert!(!response.restart);
        }

        let css = handle(&mut state, &mut store, WebRequest::get("/styles.css"));
        assert_eq!(css.content_type, "text/css");

        let missing = handle(&mut state, &mut store, WebRequest::get("/nope"));
        assert_eq!(missing, WebResponse::not_found());
        assert_eq!(store.region().commits(), 0);
    }

    #[test]
    fn test_partial_update_changes_only_submitted_field() {
        let mut state = state(None);
        let before = state.config.clone();
        let mut store = ConfigStore::new(MemoryRegion::new());

        let response = handle(
            &mut state,
            &mut store,
            WebRequest::post("/sensor", &[("endpoint", "x"), ("print", ""), ("poll", "0"), ("jwt", "")]),
        );
        assert_eq!(response.status, 200);
        assert!(response.restart);
        assert_eq!(
            state.config,
            Configuration {
                endpoint: "x".to_string(),
                ..before
            }
        );

        let mut reloaded = ConfigStore::new(store.into_region());
        assert_eq!(reloaded.load_configuration(), state.config);
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut state = state(None);
        let mut store = ConfigStore::new(MemoryRegion::new());
        let response = handle(
            &mut state,
            &mut store,
            WebRequest::post("/sensor", &[("poll", "abc"), ("endpoint", "")]),
        );
        assert_eq!(response.status, 400);
        assert!(!response.restart);
        assert_eq!(state.config, Configuration::default());
        assert_eq!(store.region().commits(), 0);
    }

    #[test]
    fn test_credentials_require_ssid_and_password() {
        let mut state = state(Some(NetworkCredentials::default()));
        let mut store = ConfigStore::new(MemoryRegion::new());

        for fields in [
            vec![("ssid", "HomeNet")],
            vec![("password", "secret")],
            vec![("ssid", ""), ("password", "secret")],
        ] {
            let response = handle(&mut state, &mut store, WebRequest::post("/wifi", &fields));
            assert_eq!(response.status, 417);
            assert!(!response.restart);
        }
        assert_eq!(state.credentials, Some(NetworkCredentials::default()));

        let response = handle(
            &mut state,
            &mut store,
            WebRequest::post("/wifi", &[("ssid", "HomeNet"), ("password", "secret"), ("keep_ap_on", "1")]),
        );
        assert!(response.restart);
        assert_eq!(
            state.credentials,
            Some(NetworkCredentials::new("HomeNet", "secret", true))
        );
    }

    #[test]
    fn test_wired_has_no_credentials_routes() {
        let mut state = state(None);
        let mut store = ConfigStore::new(MemoryRegion::new());
        let response = handle(
            &mut state,
            &mut store,
            WebRequest::post("/wifi", &[("ssid", "HomeNet"), ("password", "secret")]),
        );
        assert_eq!(response.status, 404);
        assert_eq!(handle(&mut state, &mut store, WebRequest::get("/wificonfig.html")).status, 404);
    }

    #[test]
    fn test_persist_failure_does_not_restart() {
        let mut state = state(None);
        let mut store = ConfigStore::new(FailingRegion);
        let response = handle(&mut state, &mut store, WebRequest::post("/sensor", &[("endpoint", "x")]));
        assert_eq!(response.status, 500);
        assert!(!response.restart);
        assert_eq!(state.config, Configuration::default());
    }
}

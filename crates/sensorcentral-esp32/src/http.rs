//! HTTP client and server for the ESP32 node.
//!
//! The server runs its handlers on the ESP-IDF httpd task. Each request is
//! queued into the main loop, which renders the page during its next
//! iteration; the handler blocks until the reply comes back.

use crate::describe;
use anyhow::{anyhow, Result};
use embedded_svc::{
    http::{client::Client as HttpClientBase, Method},
    io::{Read, Write},
};
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
use log::warn;
use sensorcentral_core::MAX_RESPONSE_BODY_LEN;
use sensorcentral_node::web::parse_form;
use sensorcentral_node::{
    HttpClient, HttpPost, HttpReply, InboundRequest, Method as WebMethod, TransportError,
    WebRequest,
};
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a handler waits for the main loop.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_FORM_LEN: usize = 1024;

// ============================================================================
// Client
// ============================================================================

/// Telemetry client opening a fresh connection per post.
#[derive(Debug, Default)]
pub struct EspClient;

impl HttpClient for EspClient {
    fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError> {
        let conf = HttpClientConfiguration {
            timeout: Some(CLIENT_TIMEOUT),
            ..Default::default()
        };
        let connection =
            EspHttpConnection::new(&conf).map_err(|e| TransportError::Connect(describe(e)))?;
        let mut client = HttpClientBase::wrap(connection);

        let headers: Vec<(&str, &str)> = request
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let mut outgoing = client
            .request(Method::Post, &request.url, &headers)
            .map_err(|e| TransportError::Connect(describe(e)))?;
        outgoing
            .write_all(request.body.as_bytes())
            .map_err(|e| TransportError::Io(describe(e)))?;
        outgoing
            .flush()
            .map_err(|e| TransportError::Io(describe(e)))?;

        let mut response = outgoing
            .submit()
            .map_err(|e| TransportError::Http(describe(e)))?;
        let status = response.status();

        let mut body = Vec::new();
        let mut chunk = [0_u8; 256];
        while body.len() < MAX_RESPONSE_BODY_LEN {
            let read = response
                .read(&mut chunk)
                .map_err(|e| TransportError::Io(describe(e)))?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }
        Ok(HttpReply {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

// ============================================================================
// Server bridge
// ============================================================================

/// Start the web server; every GET and POST is forwarded through `queue`.
pub fn start_server(queue: Sender<InboundRequest>) -> Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: 10 * 1024,
        uri_match_wildcard: true,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&conf)?;

    for (method, web_method) in [(Method::Get, WebMethod::Get), (Method::Post, WebMethod::Post)] {
        let queue = queue.clone();
        server.fn_handler::<anyhow::Error, _>("/*", method, move |mut req| {
            let (path, query) = match req.uri().split_once('?') {
                Some((path, query)) => (path.to_string(), query.to_string()),
                None => (req.uri().to_string(), String::new()),
            };

            let form = match web_method {
                WebMethod::Get => parse_form(&query),
                WebMethod::Post => {
                    let len = req.content_len().unwrap_or(0) as usize;
                    if len > MAX_FORM_LEN {
                        req.into_status_response(413)?;
                        return Ok(());
                    }
                    let mut body = vec![0_u8; len];
                    if len > 0 {
                        req.read_exact(&mut body)?;
                    }
                    parse_form(&String::from_utf8_lossy(&body))
                }
            };

            let (reply_tx, reply_rx) = mpsc::sync_channel(1);
            let request = WebRequest {
                method: web_method,
                path,
                form,
            };
            queue
                .send(InboundRequest::new(request, move |response| {
                    let _ = reply_tx.send(response);
                }))
                .map_err(|_| anyhow!("main loop is gone"))?;

            match reply_rx.recv_timeout(REPLY_TIMEOUT) {
                Ok(response) => {
                    req.into_response(
                        response.status,
                        None,
                        &[("Content-Type", response.content_type)],
                    )?
                    .write_all(response.body.as_bytes())?;
                }
                Err(_) => {
                    warn!("Main loop did not answer within {:?}", REPLY_TIMEOUT);
                    req.into_status_response(503)?;
                }
            }
            Ok(())
        })?;
    }
    Ok(server)
}

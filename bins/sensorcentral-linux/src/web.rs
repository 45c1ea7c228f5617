//! HTTP front end for the simulated node.
//!
//! Axum accepts connections, but the pages are rendered by the node's own
//! handler inside the main loop. Each request is queued as an
//! [`InboundRequest`] and the handler waits for the loop to answer it.

use axum::{
    extract::State,
    http::{header, Method as HttpMethod, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use sensorcentral_node::web::parse_form;
use sensorcentral_node::{InboundRequest, Method, WebRequest, WebResponse};
use std::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

/// Queue into the main loop.
#[derive(Clone)]
pub struct LoopQueue {
    tx: Sender<InboundRequest>,
}

/// Build the router forwarding every request to the main loop.
pub fn router(tx: Sender<InboundRequest>) -> Router {
    Router::new()
        .fallback(forward)
        .with_state(LoopQueue { tx })
        .layer(TraceLayer::new_for_http())
}

async fn forward(
    State(queue): State<LoopQueue>,
    method: HttpMethod,
    uri: Uri,
    body: String,
) -> Response {
    let (method, form) = match method {
        HttpMethod::GET => (Method::Get, parse_form(uri.query().unwrap_or_default())),
        HttpMethod::POST => (Method::Post, parse_form(&body)),
        _ => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };
    let request = WebRequest {
        method,
        path: uri.path().to_string(),
        form,
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let inbound = InboundRequest::new(request, move |response| {
        let _ = reply_tx.send(response);
    });
    if queue.tx.send(inbound).is_err() {
        return unavailable();
    }

    match reply_rx.await {
        Ok(response) => into_http(response),
        Err(_) => unavailable(),
    }
}

fn into_http(response: WebResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, response.content_type)], response.body).into_response()
}

fn unavailable() -> Response {
    tracing::warn!("Main loop is not running, dropping request");
    (StatusCode::SERVICE_UNAVAILABLE, "Node is restarting").into_response()
}

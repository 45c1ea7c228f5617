//! HTML views of the configuration web surface.

use crate::state::AppState;
use sensorcentral_core::sensor::SensorType;
use sensorcentral_core::{SensorSnapshot, TelemetryResponse, VALUE_DECIMALS};
use sensorcentral_protocol::{LAST_CHANGE, PRODUCT_VERSION};
use std::fmt::Write;

/// Leading token characters shown before the ellipsis.
const TOKEN_PREFIX_LEN: usize = 15;

/// Leading password characters shown before the mask.
const PASSWORD_PREFIX_LEN: usize = 4;

pub const STYLES: &str = "\
* { font-size: 14pt; }
a { font-weight: bold; }
table { margin-left: auto; margin-right: auto; }
.block { width: 60%; margin: 0 auto 10px auto; position: relative; }
.title { text-align: center; font-weight: bold; font-size: 20pt; }
.footer { text-align: right; font-size: 10pt; font-style: italic; }
.item { text-align: center; background-color: #efefef; border: 1px solid black; }
.tall { height: 30px; }
";

fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Token as shown in pages and logs: first 15 characters and `...`.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "<none configured>".to_string();
    }
    format!("{}...", prefix(token, TOKEN_PREFIX_LEN))
}

/// Password as shown in pages: first 4 characters and `****`.
pub fn mask_password(password: &str) -> String {
    format!("{}****", prefix(password, PASSWORD_PREFIX_LEN))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, back: bool, content: &str) -> String {
    let back_link = if back {
        "<div class=\"block\"><a href=\"./\">Back</a></div>"
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html><html><head><meta name=\"viewport\" content=\"initial-scale=1.0\">\
         <title>SensorCentral</title><link rel=\"stylesheet\" href=\"./styles.css\"></head>\
         <body>{}<div class=\"block title\">{}</div>{}</body></html>",
        back_link, title, content
    )
}

pub fn menu() -> String {
    let mut content = String::new();
    for (href, label) in [
        ("./data.html", "Data"),
        ("./sensorconfig.html", "Device/Sensor Config."),
        ("./wificonfig.html", "Wi-Fi Config."),
        ("./httpstatus.html", "HTTP status"),
    ] {
        let _ = write!(
            content,
            "<div class=\"block item tall\"><a href=\"{}\">{}</a></div>",
            href, label
        );
    }
    let _ = write!(
        content,
        "<div class=\"block footer\">{}<br/>{}</div>",
        PRODUCT_VERSION, LAST_CHANGE
    );
    page("Menu", false, &content)
}

pub fn data(snapshot: &SensorSnapshot) -> String {
    let mut content = String::from("<div class=\"block item\">");
    if snapshot.is_empty() {
        content.push_str("No sensor readings available");
    }
    for reading in snapshot.iter() {
        let _ = write!(
            content,
            "{}: {:.*}<br/>",
            escape(reading.id.as_str()),
            VALUE_DECIMALS,
            reading.value
        );
    }
    content.push_str("</div>");
    page("Data", true, &content)
}

pub fn sensor_config(state: &AppState) -> String {
    let config = &state.config;
    let endpoint = if config.has_endpoint() {
        config.endpoint.as_str()
    } else {
        "<none configured>"
    };

    let mut content = String::from("<div class=\"block item\"><p>");
    let _ = write!(
        content,
        "Device ID: {}<br/>\
         Current delay print: {}ms<br/>\
         Current delay poll: {}ms<br/>\
         Current delay post: {}ms<br/>\
         Current endpoint: {}<br/>\
         Current JWT: {}<br/>\
         Current sensor type: {}<br/></p>",
        state.identity,
        config.print_interval_ms,
        config.poll_interval_ms,
        config.post_interval_ms,
        escape(endpoint),
        escape(&mask_token(&config.token)),
        escape(&config.sensor_type),
    );

    content.push_str("<form method=\"post\" action=\"/sensor\"><table border=\"0\">");
    for (name, label) in [
        ("print", "Delay, print"),
        ("poll", "Delay, poll"),
        ("post", "Delay, post"),
        ("endpoint", "Endpoint"),
        ("jwt", "JWT"),
    ] {
        let _ = write!(
            content,
            "<tr><td align=\"left\">{}</td><td><input type=\"text\" name=\"{}\" autocomplete=\"off\"></td></tr>",
            label, name
        );
    }
    content.push_str("<tr><td align=\"left\">Sensor type</td><td><select name=\"sensortype\">");
    for sensor_type in SensorType::ALL {
        let _ = write!(content, "<option>{}</option>", sensor_type);
    }
    content.push_str(
        "</select></td></tr><tr><td colspan=\"2\" align=\"right\"><input type=\"submit\"></td></tr>\
         </table></form></div>",
    );
    page("Device/Sensor Config.", true, &content)
}

/// Credentials view. Only served by transports that keep credentials.
pub fn wifi_config(state: &AppState) -> String {
    let (name, password, keep) = match &state.credentials {
        Some(c) => (
            c.network_name.as_str(),
            mask_password(&c.network_password),
            c.keep_access_point_on,
        ),
        None => ("", mask_password(""), false),
    };

    let content = format!(
        "<div class=\"block item\"><p>\
         Current SSID: {}<br/>\
         Current Password: {}<br/>\
         Keep AP on: {}<br/>\
         Status: {}</p>\
         <form method=\"post\" action=\"/wifi\"><table border=\"0\">\
         <tr><td align=\"left\">SSID</td><td><input type=\"text\" name=\"ssid\" autocomplete=\"off\"></td></tr>\
         <tr><td align=\"left\">Password</td><td><input type=\"text\" name=\"password\" autocomplete=\"off\"></td></tr>\
         <tr><td align=\"left\">Keep AP on</td><td><input type=\"checkbox\" name=\"keep_ap_on\" value=\"1\"></td></tr>\
         <tr><td colspan=\"2\" align=\"right\"><input type=\"submit\"></td></tr>\
         </table></form></div>",
        escape(name),
        escape(&password),
        if keep { "Yes" } else { "No" },
        state.connectivity,
    );
    page("Wi-Fi Config.", true, &content)
}

pub fn http_status(response: &TelemetryResponse) -> String {
    let content = format!(
        "<div class=\"block item\">HTTP Code: {}<br/>HTTP Response: <br/>{}<br/></div>",
        response.status_code,
        escape(&response.body_text)
    );
    page("HTTP Status", true, &content)
}

pub fn restarting() -> String {
    page("Restarting", false, "")
}

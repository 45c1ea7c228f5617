//! Host network link for the simulator.
//!
//! The simulated node uses the wired transport: [`HostLink`] stands in for
//! the Ethernet interface and [`RawHttpClient`] posts telemetry with plain
//! HTTP/1.0 over a `TcpStream`, the way a bare Ethernet shield does. There is
//! no TLS: `https://` endpoints are refused with [`HTTPS_UNSUPPORTED`].

use sensorcentral_core::DeviceIdentity;
use sensorcentral_node::transport::{EthernetInterface, LeaseEvent, LinkStatus};
use sensorcentral_node::{HttpClient, HttpPost, HttpReply, TransportError};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::warn;

const IO_TIMEOUT: Duration = Duration::from_secs(10);

pub const HTTPS_UNSUPPORTED: &str = "HTTPS is not supported by the simulator, use an http:// endpoint";

/// The host's own network, reported as an always-up wired link.
pub struct HostLink {
    identity: DeviceIdentity,
    address: Option<Ipv4Addr>,
}

impl HostLink {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            address: None,
        }
    }
}

/// Address of the interface that would carry outbound traffic.
fn outbound_address() -> Option<Ipv4Addr> {
    // Connecting a UDP socket sends nothing; it only selects a route
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

impl EthernetInterface for HostLink {
    fn hardware_identity(&self) -> DeviceIdentity {
        self.identity
    }

    fn link_status(&self) -> LinkStatus {
        LinkStatus::Up
    }

    fn begin(&mut self) -> Result<(), TransportError> {
        self.address = Some(outbound_address().unwrap_or(Ipv4Addr::LOCALHOST));
        Ok(())
    }

    fn maintain_lease(&mut self) -> LeaseEvent {
        match outbound_address() {
            Some(ip) if Some(ip) != self.address => {
                self.address = Some(ip);
                LeaseEvent::Renewed(ip)
            }
            _ => LeaseEvent::Unchanged,
        }
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }
}

/// Target of a plain `http://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

fn parse_url(url: &str) -> Result<Target, TransportError> {
    if url.starts_with("https://") {
        return Err(TransportError::Connect(HTTPS_UNSUPPORTED.to_string()));
    }
    let rest = url.strip_prefix("http://").ok_or_else(|| {
        TransportError::Connect(format!("Unsupported URL scheme: {}", url))
    })?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| TransportError::Connect(format!("Invalid port in {}", url)))?;
            (host, port)
        }
        None => (authority, 80),
    };
    if host.is_empty() {
        return Err(TransportError::Connect(format!("Missing host in {}", url)));
    }
    Ok(Target {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

fn parse_response(raw: &[u8]) -> Result<HttpReply, TransportError> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text.as_ref(), ""));
    let status_line = head.lines().next().unwrap_or_default();

    let mut parts = status_line.split_whitespace();
    let status = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse()
            .map_err(|_| TransportError::Http(format!("Bad status line: {}", status_line)))?,
        _ => return Err(TransportError::Http(format!("Bad status line: {}", status_line))),
    };
    Ok(HttpReply {
        status,
        body: body.to_string(),
    })
}

/// HTTP/1.0 client over a fresh TCP connection per request.
#[derive(Debug, Default)]
pub struct RawHttpClient;

impl HttpClient for RawHttpClient {
    fn post(&mut self, request: &HttpPost) -> Result<HttpReply, TransportError> {
        let target = parse_url(&request.url).map_err(|e| {
            warn!("Not posting to {}: {}", request.url, e);
            e
        })?;
        let address = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect(e.to_string()))?
            .next()
            .ok_or_else(|| TransportError::Connect(format!("No address for {}", target.host)))?;

        let mut stream = TcpStream::connect_timeout(&address, IO_TIMEOUT)
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let io = |e: std::io::Error| TransportError::Io(e.to_string());
        stream.set_read_timeout(Some(IO_TIMEOUT)).map_err(io)?;
        stream.set_write_timeout(Some(IO_TIMEOUT)).map_err(io)?;

        let mut head = format!("POST {} HTTP/1.0\r\nHost: {}\r\n", target.path, target.host);
        for (name, value) in &request.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("Connection: close\r\n\r\n");

        stream.write_all(head.as_bytes()).map_err(io)?;
        stream.write_all(request.body.as_bytes()).map_err(io)?;
        stream.flush().map_err(io)?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).map_err(io)?;
        parse_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_parse_url() {
        assert_eq!(
            parse_url("http://collector.local:8080/api/data").unwrap(),
            Target {
                host: "collector.local".to_string(),
                port: 8080,
                path: "/api/data".to_string(),
            }
        );
        assert_eq!(parse_url("http://collector.local").unwrap().path, "/");
        assert_eq!(parse_url("http://collector.local").unwrap().port, 80);
        assert_eq!(
            parse_url("https://collector.local"),
            Err(TransportError::Connect(HTTPS_UNSUPPORTED.to_string()))
        );
        assert!(parse_url("ftp://collector.local").is_err());
        assert!(parse_url("http://:80/").is_err());
        assert!(parse_url("http://host:port/").is_err());
    }

    #[test]
    fn test_parse_response() {
        let reply = parse_response(b"HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok").unwrap();
        assert_eq!(reply, HttpReply { status: 201, body: "ok".to_string() });

        let reply = parse_response(b"HTTP/1.0 204 No Content\r\n").unwrap();
        assert_eq!(reply.status, 204);
        assert_eq!(reply.body, "");

        assert!(parse_response(b"").is_err());
        assert!(parse_response(b"garbage\r\n\r\n").is_err());
    }

    #[test]
    fn test_post_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 1024];
            // Read until the full body (2 bytes) has arrived
            while !String::from_utf8_lossy(&received).ends_with("\r\n\r\n{}") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nstored")
                .unwrap();
            String::from_utf8(received).unwrap()
        });

        let request = HttpPost {
            url: format!("http://127.0.0.1:{}/api/data", port),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), "Bearer abc".to_string()),
            ],
            body: "{}".to_string(),
        };
        let reply = RawHttpClient.post(&request).unwrap();
        assert_eq!(reply, HttpReply { status: 200, body: "stored".to_string() });

        let received = server.join().unwrap();
        assert!(received.starts_with("POST /api/data HTTP/1.0\r\n"));
        assert!(received.contains("Authorization: Bearer abc\r\n"));
        assert!(received.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_https_endpoint_refused_with_reason() {
        let request = HttpPost {
            url: "https://collector.example/api/data".to_string(),
            headers: Vec::new(),
            body: "{}".to_string(),
        };
        let err = RawHttpClient.post(&request).unwrap_err();
        assert!(err.to_string().contains("HTTPS is not supported by the simulator"));
    }

    #[test]
    fn test_post_to_closed_port_fails() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = HttpPost {
            url: format!("http://127.0.0.1:{}/", port),
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(matches!(RawHttpClient.post(&request), Err(TransportError::Connect(_))));
    }

    #[test]
    fn test_host_link_always_up() {
        let mut link = HostLink::new(DeviceIdentity([2, 0, 0, 0, 0, 1]));
        assert_eq!(link.link_status(), LinkStatus::Up);
        link.begin().unwrap();
        assert!(link.address().is_some());
    }
}

//! Shared test helpers for wdrive-core integration tests.
//!
//! This module provides an in-memory automation server ([`MockWda`]) for
//! exercising the session, resolver and element layers, and a raw TCP HTTP
//! server for exercising [`HttpTransport`] end to end.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use wdrive_core::client::Client;
use wdrive_core::config::ClientConfig;
use wdrive_core::error::Result;
use wdrive_core::policy::RetryPolicy;
use wdrive_core::transport::{Method, Request, Transport};

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Install a fmt subscriber writing through the test harness.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// In-memory server
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&Request) -> Result<Value> + Send + Sync>;

/// A scripted automation server.
///
/// Every request is recorded, then answered by the handler closure. The
/// handler sees full paths, e.g. `/session/S1/element`.
pub struct MockWda {
    handler: Handler,
    log: Mutex<Vec<Request>>,
}

impl MockWda {
    pub fn new(handler: impl Fn(&Request) -> Result<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    /// Number of requests matching `method` and `path` exactly.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Number of requests whose path ends with `suffix`.
    pub fn count_suffix(&self, method: Method, suffix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(suffix))
            .count()
    }

    /// Body of the last request whose path ends with `suffix`.
    pub fn last_body(&self, suffix: &str) -> Option<Value> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path.ends_with(suffix))
            .and_then(|r| r.body.clone())
    }
}

#[async_trait]
impl Transport for MockWda {
    async fn request(&self, request: &Request) -> Result<Value> {
        self.log.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

/// Response to `POST /session`.
pub fn session_created(id: &str) -> Value {
    json!({ "sessionId": id, "value": { "sessionId": id, "capabilities": {} } })
}

/// Response to `GET /status` when no session is running.
pub fn status_without_session() -> Value {
    json!({ "value": { "ready": true, "state": "success" }, "sessionId": null })
}

/// A single element reference.
pub fn element_ref(id: &str) -> Value {
    json!({ "value": { "ELEMENT": id } })
}

/// Tight retry budgets so tests finish quickly.
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        session_retry: RetryPolicy::new(3, Duration::from_millis(10)),
        find_poll: RetryPolicy::until_deadline(Duration::from_millis(50)),
        click_retry: RetryPolicy::new(3, Duration::from_millis(10)),
        element_timeout: Duration::from_millis(500),
        launch_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

pub fn client_for(mock: &Arc<MockWda>, config: ClientConfig) -> Client {
    Client::with_transport(config, mock.clone())
}

// ---------------------------------------------------------------------------
// Raw HTTP server
// ---------------------------------------------------------------------------

/// What the HTTP mock does with one incoming connection.
pub enum HttpBehavior {
    /// Read the request and reply with `status` and `body`.
    Respond(u16, String),
    /// Read the request and never answer.
    Hang,
}

/// Start an HTTP/1.1 server that serves one connection per behavior, in
/// order, closing each connection after replying.
///
/// Each received request (start line plus body) is sent on the returned
/// channel.
pub async fn mock_http_server(
    behaviors: Vec<HttpBehavior>,
) -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        for behavior in behaviors {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };

            let Some(request) = read_http_request(&mut stream).await else {
                return;
            };
            let _ = tx.send(request);

            match behavior {
                HttpBehavior::Respond(status, body) => {
                    let response = format!(
                        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        reason(status),
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.flush().await;
                }
                HttpBehavior::Hang => {
                    std::future::pending::<()>().await;
                }
            }
        }
    });

    (addr, rx)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Read one request; returns `"<METHOD> <PATH> <BODY>"`.
async fn read_http_request(stream: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let start_line = head.lines().next().unwrap_or_default();
    let mut parts = start_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
    Some(format!("{method} {path} {body}").trim_end().to_string())
}

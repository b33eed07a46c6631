//! HTTP/JSON transport to the automation server.
//!
//! This module provides the [`Transport`] seam and its production
//! implementation, [`HttpTransport`], which issues one request per call and
//! returns the decoded JSON body.
//!
//! The server signals a few error conditions *in band*: a 404 response whose
//! `value.error` carries a fixed string. Those strings are surfaced as the
//! result value and recognised by [`Sentinel::detect`]; interpreting them is
//! up to the session and element layers.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wdrive_core::transport::{HttpTransport, Request, Transport};
//!
//! # async fn example() -> wdrive_core::error::Result<()> {
//! let transport = HttpTransport::new("http://localhost:8100", Duration::from_secs(30))?;
//! let status = transport.request(&Request::get("/status")).await?;
//! println!("{status}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, debug_span, trace, Instrument};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// In-band error strings returned by the server in place of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    InvalidSessionId,
    NoSuchElement,
    StaleElementReference,
}

impl Sentinel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Sentinel::InvalidSessionId => "invalid session id",
            Sentinel::NoSuchElement => "no such element",
            Sentinel::StaleElementReference => "stale element reference",
        }
    }

    /// Returns the sentinel if `value` is exactly one of the known strings.
    ///
    /// Only a bare JSON string matches; a sentinel nested inside an object
    /// is an ordinary payload.
    pub fn detect(value: &Value) -> Option<Sentinel> {
        match value.as_str()? {
            "invalid session id" => Some(Sentinel::InvalidSessionId),
            "no such element" => Some(Sentinel::NoSuchElement),
            "stale element reference" => Some(Sentinel::StaleElementReference),
            _ => None,
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request descriptor
// ---------------------------------------------------------------------------

/// HTTP verbs used by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A single request: method, absolute path, optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    /// A POST without a body.
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path, None)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    /// Re-root this request under `prefix`, e.g. `/session/{id}`.
    pub fn scoped(mut self, prefix: &str) -> Self {
        self.path = format!("{prefix}{}", self.path);
        self
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Anything able to carry a [`Request`] to the server.
///
/// Implementations return the decoded JSON body for every HTTP status. A 404
/// is a protocol-level failure, not a transport failure: the embedded
/// `value.error` description is returned as the value.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: &Request) -> Result<Value>;
}

/// Extracts the in-band error description from a 404 payload.
///
/// Falls back to the whole body when it has no `value.error` string.
pub fn not_found_payload(body: Value) -> Value {
    if let Some(Value::String(err)) = body.pointer("/value/error") {
        return Value::String(err.clone());
    }
    body
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url`.
    ///
    /// `request_timeout` bounds each individual round-trip.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Transport {
                method: "-".to_string(),
                path: base_url.clone(),
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(request: &Request, err: impl fmt::Display) -> Error {
        Error::Transport {
            method: request.method.to_string(),
            path: request.path.clone(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: &Request) -> Result<Value> {
        let span = debug_span!("http_request", method = %request.method, path = %request.path);
        async {
            let url = format!("{}{}", self.base_url, request.path.trim());
            let mut builder = self.client.request(request.method.into(), &url);
            if let Some(body) = &request.body {
                trace!(%body, "request body");
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Self::transport_error(request, e))?;
            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Self::transport_error(request, e))?;

            let body: Value =
                serde_json::from_slice(&bytes).map_err(|e| Error::MalformedResponse {
                    path: request.path.clone(),
                    message: e.to_string(),
                })?;

            debug!(status = status.as_u16(), "response received");
            if status == StatusCode::NOT_FOUND {
                let payload = not_found_payload(body);
                debug!(error = %payload, "server reported not found");
                return Ok(payload);
            }
            Ok(body)
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

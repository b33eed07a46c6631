//! Session ownership and recovery.
//!
//! [`SessionManager`] is the only place that reads or writes the active
//! session id. It creates a session lazily, adopts one another process already
//! started (via `GET /status`), and forgets the id as soon as the server
//! answers a session-scoped call with the `"invalid session id"` sentinel.
//!
//! Session-scoped requests go through [`SessionManager::request`], which
//! prefixes `/session/{id}`, interprets the in-band sentinels, and retries
//! under the configured [`RetryPolicy`]: an invalidated session is recovered
//! on the next attempt.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wdrive_core::policy::RetryPolicy;
//! use wdrive_core::session::{Capabilities, SessionManager};
//! use wdrive_core::transport::{HttpTransport, Request};
//!
//! # async fn example() -> wdrive_core::error::Result<()> {
//! let transport = Arc::new(HttpTransport::new("http://localhost:8100", Duration::from_secs(30))?);
//! let sessions = SessionManager::new(
//!     transport,
//!     Capabilities::for_bundle("com.apple.Preferences"),
//!     RetryPolicy::new(10, Duration::from_millis(500)),
//! );
//!
//! let size = sessions.request(&Request::get("/window/size")).await?;
//! println!("{size}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::policy::{retry, RetryPolicy};
use crate::transport::{Request, Sentinel, Transport};

/// Retryable kinds absorbed by [`SessionManager::request`].
pub const SESSION_RETRY_ON: &[ErrorKind] = &[ErrorKind::SessionInvalidated, ErrorKind::ElementNotFound];

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Desired capabilities for session creation.
///
/// Only the application bundle id is recognised; it is sent as an
/// `alwaysMatch` condition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub bundle_id: Option<String>,
}

impl Capabilities {
    pub fn for_bundle(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: Some(bundle_id.into()),
        }
    }

    /// The `POST /session` body. A missing or blank bundle id yields empty
    /// capabilities; otherwise the id is sent exactly as given.
    pub fn to_body(&self) -> Value {
        match self.bundle_id.as_deref() {
            Some(bundle_id) if !bundle_id.trim().is_empty() => json!({
                "capabilities": { "alwaysMatch": { "bundleId": bundle_id } }
            }),
            _ => json!({ "capabilities": {} }),
        }
    }
}

/// Reads the session id out of a create-session or status response.
///
/// Accepts both the top-level `sessionId` and the W3C `value.sessionId`.
fn extract_session_id(body: &Value) -> Option<&str> {
    body.get("sessionId")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/value/sessionId").and_then(Value::as_str))
        .filter(|id| !id.is_empty())
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SessionState {
    current: Option<String>,
    /// Last id the server rejected; never adopted again from `/status`.
    rejected: Option<String>,
}

/// Owner of the active session id.
///
/// The id lives behind a [`tokio::sync::Mutex`] that is held across
/// read/recover/recreate, so concurrent callers never create two sessions.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
    retry_policy: RetryPolicy,
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        capabilities: Capabilities,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            capabilities,
            retry_policy,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The cached session id, if any. Never contacts the server.
    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.current.clone()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns the cached session id, creating a session with `capabilities`
    /// if there is none.
    ///
    /// Session creation is not idempotent on the server, so this only issues
    /// `POST /session` when nothing is cached.
    #[instrument(skip(self), level = "debug")]
    pub async fn ensure_session(&self, capabilities: &Capabilities) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(id) = &state.current {
            return Ok(id.clone());
        }
        let id = self.create(capabilities).await?;
        state.current = Some(id.clone());
        Ok(id)
    }

    /// Forget the cached session id.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if let Some(id) = state.current.take() {
            debug!(session_id = %id, "session invalidated");
            state.rejected = Some(id);
        }
    }

    /// Returns the cached id, or recovers one: adopt the session reported by
    /// `GET /status` if there is one, otherwise create a new session.
    #[instrument(skip(self), level = "debug")]
    pub async fn current_or_recover(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if let Some(id) = &state.current {
            return Ok(id.clone());
        }

        let status = self.transport.request(&Request::get("/status")).await?;
        let adoptable = extract_session_id(&status)
            .filter(|id| state.rejected.as_deref() != Some(*id))
            .map(str::to_string);

        let id = match adoptable {
            Some(id) => {
                info!(session_id = %id, "adopting existing session");
                id
            }
            None => self.create(&self.capabilities).await?,
        };
        state.current = Some(id.clone());
        Ok(id)
    }

    /// Delete the active session on the server and forget it.
    ///
    /// Does nothing when no session is cached.
    #[instrument(skip(self), level = "debug")]
    pub async fn terminate(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(id) = state.current.take() else {
            return Ok(());
        };
        info!(session_id = %id, "terminating session");
        self.transport
            .request(&Request::delete(format!("/session/{id}")))
            .await?;
        Ok(())
    }

    /// Send a session-scoped request, absorbing an invalidated session and a
    /// transiently missing element under the configured retry policy.
    pub async fn request(&self, request: &Request) -> Result<Value> {
        self.request_with(request, SESSION_RETRY_ON).await
    }

    /// Like [`request`](Self::request), but only the kinds in `retry_on`
    /// are retried.
    pub async fn request_with(&self, request: &Request, retry_on: &[ErrorKind]) -> Result<Value> {
        retry(self.retry_policy, retry_on, || self.request_once(request)).await
    }

    /// One attempt at a session-scoped request.
    async fn request_once(&self, request: &Request) -> Result<Value> {
        let session_id = self.current_or_recover().await?;
        let scoped = request.clone().scoped(&format!("/session/{session_id}"));
        let value = self.transport.request(&scoped).await?;

        match Sentinel::detect(&value) {
            Some(Sentinel::InvalidSessionId) => {
                warn!(session_id = %session_id, path = %scoped.path, "invalid session id");
                self.invalidate_if_current(&session_id).await;
                Err(Error::SessionInvalidated { session_id })
            }
            Some(Sentinel::NoSuchElement) => {
                debug!(path = %scoped.path, "no such element");
                Err(Error::ElementNotFound {
                    target: format!("{} {}", scoped.method, scoped.path),
                    waited: None,
                })
            }
            _ => Ok(value),
        }
    }

    /// Clear the cache only if it still holds `session_id`; another caller
    /// may already have recovered.
    async fn invalidate_if_current(&self, session_id: &str) {
        let mut state = self.state.lock().await;
        if state.current.as_deref() == Some(session_id) {
            state.current = None;
            state.rejected = Some(session_id.to_string());
        }
    }

    async fn create(&self, capabilities: &Capabilities) -> Result<String> {
        let body = self
            .transport
            .request(&Request::post("/session", capabilities.to_body()))
            .await?;
        let id = extract_session_id(&body)
            .map(str::to_string)
            .ok_or_else(|| Error::SessionCreation(format!("no sessionId in response: {body}")))?;
        info!(session_id = %id, bundle_id = ?capabilities.bundle_id, "session created");
        Ok(id)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("capabilities", &self.capabilities)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

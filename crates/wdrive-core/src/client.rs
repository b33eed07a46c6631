//! The automation client.
//!
//! [`Client`] ties the pieces together: it owns the [`SessionManager`], the
//! [`Transport`], and the [`ClientConfig`] every operation reads its retry
//! budgets and deadlines from. It is cheap to clone; clones share the same
//! session.
//!
//! Operations fall into two groups:
//!
//! - **Session-scoped**: element lookups, gestures, orientation, app
//!   lifecycle. These go through [`SessionManager::request`] and recover
//!   from an invalidated session transparently.
//! - **Session-independent**: status, screenshots, home screen, lock state,
//!   page source. These talk to the server directly.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wdrive_core::client::Client;
//! use wdrive_core::config::ClientConfig;
//! use wdrive_core::locator::Locator;
//!
//! # async fn example() -> wdrive_core::error::Result<()> {
//! let config = ClientConfig::default()
//!     .with_bundle_id("com.apple.Preferences")
//!     .with_element_timeout(Duration::from_secs(5));
//! let client = Client::connect(config).await?;
//!
//! client.launch_app("com.apple.Preferences").await?;
//! client.find_element(&Locator::text("General")).await?.click().await?;
//! client.swipe(0.5, 0.8, 0.5, 0.2, Duration::ZERO).await?;
//! client.screenshot().await?.save("/tmp/general.png")?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::element::ElementHandle;
use crate::error::{Error, Result};
use crate::geometry::{percent_to_pixels, WindowSize};
use crate::locator::Locator;
use crate::policy::Deadline;
use crate::resolver;
use crate::screenshot::Screenshot;
use crate::session::{Capabilities, SessionManager};
use crate::transport::{HttpTransport, Request, Transport};
use crate::types::{AppInfo, AppState, LockState, Orientation};

/// The in-band error that `home()` must not swallow.
const SPRINGBOARD_TIMEOUT: &str = "Timeout waiting until SpringBoard is visible";

/// Touch waits at or below this many milliseconds are not honoured by the
/// server and are replaced with [`FLICK_FALLBACK_WAIT_MS`].
const FLICK_MIN_WAIT_MS: u64 = 17;
const FLICK_FALLBACK_WAIT_MS: u64 = 100;

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    sessions: SessionManager,
}

/// Handle to one automation server and its session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client talking HTTP to `config.base_url`.
    ///
    /// No request is sent; the session is created on first use.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.base_url, config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over an arbitrary [`Transport`].
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let capabilities = Capabilities {
            bundle_id: config.bundle_id.clone(),
        };
        let sessions = SessionManager::new(transport.clone(), capabilities, config.session_retry);
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                sessions,
            }),
        }
    }

    /// Create a client and make sure it has a session.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let capabilities = client.sessions().capabilities().clone();
        client.sessions().ensure_session(&capabilities).await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Send a request that is not scoped to the session.
    pub async fn request(&self, request: &Request) -> Result<Value> {
        self.inner.transport.request(request).await
    }

    /// Server status, as returned by `GET /status`.
    pub async fn status(&self) -> Result<Value> {
        self.request(&Request::get("/status")).await
    }

    // -----------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------

    /// Wait for a single element matching `locator`.
    ///
    /// Polls until the configured element timeout elapses.
    pub async fn find_element(&self, locator: &Locator) -> Result<ElementHandle> {
        resolver::resolve(self, locator).await
    }

    /// All elements currently matching `locator`. Does not wait.
    pub async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        resolver::resolve_all(self, locator).await
    }

    /// Click the keyboard's "Hide keyboard" key.
    pub async fn hide_keyboard(&self) -> Result<()> {
        self.find_element(&Locator::name("Hide keyboard"))
            .await?
            .click()
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Gestures
    // -----------------------------------------------------------------

    pub async fn window_size(&self) -> Result<WindowSize> {
        let response = self.sessions().request(&Request::get("/window/size")).await?;
        let value = response.get("value").cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| Error::unexpected("window size", format!("{e}: {response}")))
    }

    /// Tap at fractional screen coordinates.
    #[instrument(skip(self), level = "debug")]
    pub async fn tap(&self, x: f64, y: f64) -> Result<()> {
        let point = percent_to_pixels(x, y, self.window_size().await?);
        self.sessions()
            .request(&Request::post("/wda/tap/0", json!({ "x": point.x, "y": point.y })))
            .await?;
        Ok(())
    }

    /// Press and hold at fractional screen coordinates.
    #[instrument(skip(self), level = "debug")]
    pub async fn tap_hold(&self, x: f64, y: f64, duration: Duration) -> Result<()> {
        let point = percent_to_pixels(x, y, self.window_size().await?);
        self.sessions()
            .request(&Request::post(
                "/wda/touchAndHold",
                json!({ "x": point.x, "y": point.y, "duration": duration.as_secs_f64() }),
            ))
            .await?;
        Ok(())
    }

    /// Drag between fractional coordinates, pressing the start point for
    /// `duration` first.
    #[instrument(skip(self), level = "debug")]
    pub async fn swipe(
        &self,
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        duration: Duration,
    ) -> Result<()> {
        let size = self.window_size().await?;
        let from = percent_to_pixels(from_x, from_y, size);
        let to = percent_to_pixels(to_x, to_y, size);
        self.sessions()
            .request(&Request::post(
                "/wda/dragfromtoforduration",
                json!({
                    "fromX": from.x,
                    "fromY": from.y,
                    "toX": to.x,
                    "toY": to.y,
                    "duration": duration.as_secs_f64(),
                }),
            ))
            .await?;
        debug!(?from, ?to, "swiped");
        Ok(())
    }

    /// Fast swipe as a press / wait / move / release touch sequence.
    #[instrument(skip(self), level = "debug")]
    pub async fn flick(
        &self,
        from_x: f64,
        from_y: f64,
        to_x: f64,
        to_y: f64,
        duration: Duration,
    ) -> Result<()> {
        let size = self.window_size().await?;
        let from = percent_to_pixels(from_x, from_y, size);
        let to = percent_to_pixels(to_x, to_y, size);
        let wait_ms = match duration.as_millis() as u64 {
            ms if ms > FLICK_MIN_WAIT_MS => ms,
            _ => FLICK_FALLBACK_WAIT_MS,
        };
        self.sessions()
            .request(&Request::post(
                "/wda/touch/perform",
                json!({
                    "actions": [
                        { "action": "press", "options": { "x": from.x, "y": from.y } },
                        { "action": "wait", "options": { "ms": wait_ms } },
                        { "action": "moveTo", "options": { "x": to.x, "y": to.y } },
                        { "action": "release", "options": {} },
                    ]
                }),
            ))
            .await?;
        Ok(())
    }

    pub async fn orientation(&self) -> Result<Orientation> {
        let response = self.sessions().request(&Request::get("/orientation")).await?;
        let value = response.get("value").cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| Error::unexpected("orientation", format!("{e}: {response}")))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn set_orientation(&self, orientation: Orientation) -> Result<()> {
        self.sessions()
            .request(&Request::post(
                "/orientation",
                json!({ "orientation": orientation }),
            ))
            .await?;
        Ok(())
    }

    /// Capture the whole screen.
    pub async fn screenshot(&self) -> Result<Screenshot> {
        let response = self.request(&Request::get("/screenshot")).await?;
        Screenshot::from_response("screenshot", &response)
    }

    // -----------------------------------------------------------------
    // Apps
    // -----------------------------------------------------------------

    /// Launch `bundle_id` and wait until it is in the foreground.
    ///
    /// Bounded by the configured launch timeout; the timeout error names the
    /// bundle id.
    #[instrument(skip(self), level = "debug")]
    pub async fn launch_app(&self, bundle_id: &str) -> Result<()> {
        let deadline = Deadline::after(self.config().launch_timeout, format!("launch app {bundle_id}"));
        let poll = self.config().find_poll.delay;

        deadline
            .run(async {
                self.sessions()
                    .request(&Request::post(
                        "/wda/apps/launch",
                        json!({ "bundleId": bundle_id }),
                    ))
                    .await?;
                loop {
                    let state = self.app_state(bundle_id).await?;
                    if state == AppState::Foreground {
                        return Ok(());
                    }
                    debug!(bundle_id, ?state, "waiting for app to reach the foreground");
                    tokio::time::sleep(poll.min(deadline.remaining())).await;
                }
            })
            .await?;

        info!(bundle_id, "app launched");
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn terminate_app(&self, bundle_id: &str) -> Result<()> {
        self.sessions()
            .request(&Request::post(
                "/wda/apps/terminate",
                json!({ "bundleId": bundle_id }),
            ))
            .await?;
        info!(bundle_id, "app terminated");
        Ok(())
    }

    pub async fn app_state(&self, bundle_id: &str) -> Result<AppState> {
        let response = self
            .sessions()
            .request(&Request::post("/wda/apps/state", json!({ "bundleId": bundle_id })))
            .await?;
        response
            .get("value")
            .and_then(Value::as_i64)
            .map(AppState::from_code)
            .ok_or_else(|| {
                Error::unexpected(
                    format!("app state of {bundle_id}"),
                    format!("expected a state code, got {response}"),
                )
            })
    }

    /// The app currently in the foreground.
    pub async fn current_app(&self) -> Result<AppInfo> {
        let response = self.sessions().request(&Request::get("/wda/apps/list")).await?;
        let first = response
            .get("value")
            .and_then(Value::as_array)
            .and_then(|apps| apps.first())
            .cloned()
            .ok_or_else(|| Error::unexpected("current app", format!("no running app in {response}")))?;
        serde_json::from_value(first)
            .map_err(|e| Error::unexpected("current app", format!("{e}: {response}")))
    }

    // -----------------------------------------------------------------
    // Device
    // -----------------------------------------------------------------

    /// Go to the home screen.
    ///
    /// Transport failures propagate. An in-band error reporting that
    /// SpringBoard never became visible is an [`Error::UnexpectedResponse`];
    /// any other in-band error is logged and ignored.
    #[instrument(skip(self), level = "debug")]
    pub async fn home(&self) -> Result<()> {
        let response = self.request(&Request::post_empty("/wda/homescreen")).await?;
        if let Some(message) = in_band_error(&response) {
            if message.contains(SPRINGBOARD_TIMEOUT) {
                return Err(Error::unexpected("home", message));
            }
            debug!(%message, "ignoring home screen error");
        }
        Ok(())
    }

    pub async fn lock(&self) -> Result<()> {
        self.request(&Request::post_empty("/wda/lock")).await?;
        Ok(())
    }

    pub async fn unlock(&self) -> Result<()> {
        self.request(&Request::post_empty("/wda/unlock")).await?;
        Ok(())
    }

    /// Ask the server to run its health check (returns to the home screen).
    pub async fn healthcheck(&self) -> Result<()> {
        self.request(&Request::get("/wda/healthcheck")).await?;
        Ok(())
    }

    pub async fn lock_state(&self) -> Result<LockState> {
        let response = self.request(&Request::get("/wda/locked")).await?;
        response
            .get("value")
            .and_then(Value::as_bool)
            .map(LockState::from)
            .ok_or_else(|| Error::unexpected("lock state", format!("expected a boolean, got {response}")))
    }

    /// The full element tree as XML.
    pub async fn page_source(&self) -> Result<String> {
        let response = self.request(&Request::get("/source")).await?;
        response
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::unexpected("page source", format!("expected a string, got {response}")))
    }

    /// The accessible elements only, as returned by the server.
    pub async fn accessible_source(&self) -> Result<Value> {
        let response = self.request(&Request::get("/wda/accessibleSource")).await?;
        Ok(response.get("value").cloned().unwrap_or(response))
    }

    /// Delete the session.
    pub async fn quit(&self) -> Result<()> {
        self.sessions().terminate().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("sessions", &self.inner.sessions)
            .finish_non_exhaustive()
    }
}

/// An error message the server returned in place of a result: either the
/// string extracted from a 404 body or a `value.error` object.
fn in_band_error(response: &Value) -> Option<String> {
    if let Value::String(message) = response {
        return Some(message.clone());
    }
    let error = response.pointer("/value/error")?;
    let message = response
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(format!("{} {message}", error.as_str().unwrap_or_default()).trim().to_string())
}

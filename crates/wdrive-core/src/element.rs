//! Handles to resolved on-screen elements.
//!
//! An [`ElementHandle`] binds a server element id to the [`Locator`] that
//! produced it. All operations are scoped to
//! `/session/{id}/element/{element_id}`.
//!
//! Element ids go stale when the UI re-renders. [`ElementHandle::click`]
//! recovers from that by re-resolving the stored locator and clicking the
//! fresh element; every other operation reports [`Error::ElementStale`] and
//! leaves recovery to the caller (see [`ElementHandle::refresh`]).
//!
//! # Example
//!
//! ```no_run
//! use wdrive_core::client::Client;
//! use wdrive_core::config::ClientConfig;
//! use wdrive_core::locator::Locator;
//!
//! # async fn example() -> wdrive_core::error::Result<()> {
//! let client = Client::new(ClientConfig::default())?;
//! let mut field = client.find_element(&Locator::accessibility_id("username")).await?;
//! field.clear().await?;
//! field.send_keys("tester").await?;
//!
//! let mut login = client.find_element(&Locator::text("Log In")).await?;
//! if login.is_enabled().await? {
//!     login.click().await?;
//! }
//! # Ok(())
//! # }
//! ```

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::Client;
use crate::error::{Error, ErrorKind, Result};
use crate::geometry::Rect;
use crate::locator::Locator;
use crate::resolver;
use crate::screenshot::Screenshot;
use crate::transport::{Request, Sentinel};

const CLICK_RETRY_ON: &[ErrorKind] = &[ErrorKind::ElementStale];

/// Lifecycle of an [`ElementHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// The id refers to a live element, as far as we know.
    Resolved,
    /// The server reported the id as stale.
    Stale,
    /// Re-resolution failed; the locator no longer matches anything.
    Detached,
}

/// A server-side element, addressable by id.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    client: Client,
    locator: Locator,
    id: String,
    index: usize,
    state: ElementState,
}

impl ElementHandle {
    pub(crate) fn new(client: Client, locator: Locator, id: String, index: usize) -> Self {
        Self {
            client,
            locator,
            id,
            index,
            state: ElementState::Resolved,
        }
    }

    /// The current server element id. Replaced when the handle re-resolves.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Position among the matches of the lookup that produced this handle.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn state(&self) -> ElementState {
        self.state
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Click the element.
    ///
    /// Each stale reference triggers one re-resolution of the stored locator
    /// and another click, bounded by the client's `click_retry` policy. If
    /// the locator no longer matches, this fails with
    /// [`Error::ElementNotFound`] and the handle becomes
    /// [`ElementState::Detached`].
    #[instrument(skip(self), fields(element_id = %self.id, locator = %self.locator), level = "debug")]
    pub async fn click(&mut self) -> Result<Value> {
        let mut attempts = self.client.config().click_retry.start(CLICK_RETRY_ON);
        loop {
            match self.request(Request::post_empty("/click")).await {
                Ok(value) => return Ok(value),
                Err(e @ Error::ElementStale { .. }) => {
                    self.state = ElementState::Stale;
                    attempts.backoff(e).await?;
                    self.refresh().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Type `text` into the element.
    #[instrument(skip(self), fields(element_id = %self.id), level = "debug")]
    pub async fn send_keys(&self, text: &str) -> Result<Value> {
        self.request(Request::post("/value", json!({ "value": text })))
            .await
    }

    /// Clear the element's text.
    #[instrument(skip(self), fields(element_id = %self.id), level = "debug")]
    pub async fn clear(&self) -> Result<Value> {
        self.request(Request::post_empty("/clear")).await
    }

    /// The element's frame in screen points.
    ///
    /// An error object in place of the frame means the element is gone and
    /// is reported as [`Error::ElementStale`].
    pub async fn rect(&self) -> Result<Rect> {
        let response = self.request(Request::get("/rect")).await?;
        let value = response.get("value").cloned().unwrap_or(Value::Null);
        if value.get("error").is_some() {
            debug!(element_id = %self.id, %value, "rect returned an error");
            return Err(self.stale());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| Error::unexpected(format!("rect of {}", self.locator), format!("{e}: {value}")))
    }

    /// Whether the element accepts interaction.
    pub async fn is_enabled(&self) -> Result<bool> {
        let response = self.request(Request::get("/enabled")).await?;
        response.get("value").and_then(Value::as_bool).ok_or_else(|| {
            Error::unexpected(
                format!("enabled state of {}", self.locator),
                format!("expected a boolean, got {response}"),
            )
        })
    }

    /// Capture just this element.
    pub async fn screenshot(&self) -> Result<Screenshot> {
        let response = self.request(Request::get("/screenshot")).await?;
        Screenshot::from_response(&format!("screenshot of {}", self.locator), &response)
    }

    /// Re-resolve the stored locator and adopt the new element id.
    ///
    /// The index is kept as-is; the lookup is a single-element resolve and
    /// does not re-establish the original position.
    pub async fn refresh(&mut self) -> Result<()> {
        match resolver::resolve_id(&self.client, &self.locator).await {
            Ok(id) => {
                info!(old = %self.id, new = %id, locator = %self.locator, "element re-resolved");
                self.id = id;
                self.state = ElementState::Resolved;
                Ok(())
            }
            Err(e) => {
                warn!(element_id = %self.id, locator = %self.locator, error = %e, "element detached");
                self.state = ElementState::Detached;
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------

    fn stale(&self) -> Error {
        Error::ElementStale {
            element_id: self.id.clone(),
            locator: self.locator.to_string(),
        }
    }

    /// Send an element-scoped request, mapping the stale sentinel.
    async fn request(&self, request: Request) -> Result<Value> {
        let scoped = request.scoped(&format!("/element/{}", self.id));
        let value = self.client.sessions().request(&scoped).await?;
        if Sentinel::detect(&value) == Some(Sentinel::StaleElementReference) {
            warn!(element_id = %self.id, locator = %self.locator, "stale element reference");
            return Err(self.stale());
        }
        Ok(value)
    }
}

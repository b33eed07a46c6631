//! Client configuration.
//!
//! All tunables (server address, retry budgets, deadlines) live in a single
//! [`ClientConfig`] handed to [`Client`](crate::client::Client) at
//! construction. Nothing is read from globals afterwards.
//!
//! A config can also be persisted in `~/.wdrive/config.json`; durations are
//! stored as integer milliseconds.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wdrive_core::config::ClientConfig;
//!
//! // Load (returns defaults if the file doesn't exist)
//! let config = ClientConfig::load()
//!     .with_bundle_id("com.example.app")
//!     .with_element_timeout(Duration::from_secs(5));
//!
//! println!("server: {}", config.base_url);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::policy::RetryPolicy;

const CONFIG_FILENAME: &str = "config.json";

/// Default address of WebDriverAgent when forwarded with `iproxy 8100 8100`.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8100";

/// Returns the wdrive directory path (`~/.wdrive/`).
///
/// Falls back to the current directory when no home directory is known.
pub fn wdrive_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wdrive")
}

/// Configuration for a [`Client`](crate::client::Client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the automation server, without a trailing path.
    pub base_url: String,

    /// Bundle id passed as the `alwaysMatch` capability on session creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,

    /// Upper bound for a single HTTP round-trip.
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,

    /// Retry budget for session-scoped requests hitting an invalid session
    /// or a transiently missing element.
    pub session_retry: RetryPolicy,

    /// Polling cadence while waiting for a single element to appear.
    pub find_poll: RetryPolicy,

    /// Retry budget for a click that keeps hitting stale references.
    pub click_retry: RetryPolicy,

    /// How long a single-element lookup may poll before giving up.
    #[serde(rename = "element_timeout_ms", with = "duration_ms")]
    pub element_timeout: Duration,

    /// How long to wait for a launched app to reach the foreground.
    #[serde(rename = "launch_timeout_ms", with = "duration_ms")]
    pub launch_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            bundle_id: None,
            request_timeout: Duration::from_secs(30),
            session_retry: RetryPolicy::new(10, Duration::from_millis(500)),
            find_poll: RetryPolicy::until_deadline(Duration::from_millis(500)),
            click_retry: RetryPolicy::new(5, Duration::from_millis(500)),
            element_timeout: Duration::from_secs(15),
            launch_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    /// Load config from `~/.wdrive/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_or_default(wdrive_dir().join(CONFIG_FILENAME))
    }

    /// Load config from `path`, falling back to [`Default`] when the file
    /// is missing or unparsable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }

    /// Load config from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Save config to `~/.wdrive/config.json`.
    pub fn save(&self) -> Result<()> {
        let dir = wdrive_dir();
        std::fs::create_dir_all(&dir)?;
        self.save_to(dir.join(CONFIG_FILENAME))
    }

    /// Save config to an explicit path as pretty-printed JSON.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

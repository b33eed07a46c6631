//! Screenshot payloads.
//!
//! The server returns PNG data base64-encoded in the response `value`.
//! [`Screenshot`] keeps the payload as received and decodes on demand.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;

use crate::error::{Error, Result};

/// A base64-encoded PNG captured from the device or an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    base64: String,
}

impl Screenshot {
    pub fn from_base64(base64: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
        }
    }

    /// Reads the payload out of a `{"value": "<base64>"}` response.
    pub(crate) fn from_response(operation: &str, response: &Value) -> Result<Self> {
        response
            .get("value")
            .and_then(Value::as_str)
            .map(Self::from_base64)
            .ok_or_else(|| Error::unexpected(operation, format!("no image payload in {response}")))
    }

    /// The payload exactly as the server sent it.
    pub fn base64(&self) -> &str {
        &self.base64
    }

    /// Decoded PNG bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        // The server may wrap long payloads across lines.
        let compact: String = self.base64.split_whitespace().collect();
        Ok(STANDARD.decode(compact)?)
    }

    /// Decode and write the image to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

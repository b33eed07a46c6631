//! Error taxonomy for the WebDriverAgent client.
//!
//! Every fallible operation in this crate returns [`Result`]. Errors are
//! split by [`Disposition`]: the retry helpers in [`crate::policy`] only ever
//! intercept [`Disposition::Retryable`] errors, everything else propagates
//! to the caller untouched.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the automation server.
#[derive(Error, Debug)]
pub enum Error {
    /// The HTTP request could not be completed (connection refused, reset,
    /// request timeout, ...).
    #[error("transport error on {method} {path}: {message}")]
    Transport {
        method: String,
        path: String,
        message: String,
    },

    /// The server answered with a body that is not valid JSON.
    #[error("malformed response from {path}: {message}")]
    MalformedResponse { path: String, message: String },

    /// The server reported that the session id we used no longer exists.
    #[error("session {session_id} is no longer valid")]
    SessionInvalidated { session_id: String },

    /// No element matched the locator.
    #[error("element not found: {target}{}", waited_suffix(.waited))]
    ElementNotFound {
        /// The locator or request path that came up empty.
        target: String,
        /// Set when the lookup polled until its deadline.
        waited: Option<Duration>,
    },

    /// The element id no longer refers to a live element.
    #[error("stale element reference {element_id} ({locator})")]
    ElementStale { element_id: String, locator: String },

    /// The server did not hand out a session id.
    #[error("failed to create session: {0}")]
    SessionCreation(String),

    /// An operation did not complete before its deadline.
    #[error("{operation}: timed out after {}ms", .limit.as_millis())]
    Timeout { operation: String, limit: Duration },

    /// The server answered, but not with what the operation expected.
    #[error("unexpected response to {operation}: {detail}")]
    UnexpectedResponse { operation: String, detail: String },

    /// A local I/O error (e.g. writing a screenshot).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A base64 payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] base64::DecodeError),
}

fn waited_suffix(waited: &Option<Duration>) -> String {
    match waited {
        Some(limit) => format!(" (waited {}ms)", limit.as_millis()),
        None => String::new(),
    }
}

/// Discriminant of [`Error`], used to select which failures a retry loop
/// is allowed to absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    MalformedResponse,
    SessionInvalidated,
    ElementNotFound,
    ElementStale,
    SessionCreation,
    Timeout,
    UnexpectedResponse,
    Io,
    Decode,
}

/// Whether an error may be recovered by trying again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retryable(ErrorKind),
    Fatal(ErrorKind),
}

impl Error {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } => ErrorKind::Transport,
            Error::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Error::SessionInvalidated { .. } => ErrorKind::SessionInvalidated,
            Error::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            Error::ElementStale { .. } => ErrorKind::ElementStale,
            Error::SessionCreation(_) => ErrorKind::SessionCreation,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
            Error::Io(_) => ErrorKind::Io,
            Error::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Classifies the error as retryable or fatal.
    ///
    /// Only the three in-band server conditions (invalid session, missing
    /// element, stale element) are retryable. Transport failures are not:
    /// a dead server is surfaced immediately.
    pub fn disposition(&self) -> Disposition {
        let kind = self.kind();
        match kind {
            ErrorKind::SessionInvalidated
            | ErrorKind::ElementNotFound
            | ErrorKind::ElementStale => Disposition::Retryable(kind),
            _ => Disposition::Fatal(kind),
        }
    }

    /// Shorthand for `matches!(self.disposition(), Disposition::Retryable(_))`.
    pub fn is_retryable(&self) -> bool {
        matches!(self.disposition(), Disposition::Retryable(_))
    }

    pub(crate) fn unexpected(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::UnexpectedResponse {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Transport {
            method: "GET".to_string(),
            path: "/status".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "transport error on GET /status: connection refused"
        );

        let err = Error::SessionInvalidated {
            session_id: "ABC".to_string(),
        };
        assert!(err.to_string().contains("ABC"));

        let err = Error::Timeout {
            operation: "launch app com.example".to_string(),
            limit: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "launch app com.example: timed out after 1500ms");
    }

    #[test]
    fn element_not_found_mentions_deadline_only_when_polled() {
        let err = Error::ElementNotFound {
            target: "name 'Login'".to_string(),
            waited: None,
        };
        assert_eq!(err.to_string(), "element not found: name 'Login'");

        let err = Error::ElementNotFound {
            target: "name 'Login'".to_string(),
            waited: Some(Duration::from_secs(15)),
        };
        assert_eq!(
            err.to_string(),
            "element not found: name 'Login' (waited 15000ms)"
        );
    }

    #[test]
    fn in_band_conditions_are_retryable() {
        let err = Error::SessionInvalidated {
            session_id: "s".to_string(),
        };
        assert_eq!(
            err.disposition(),
            Disposition::Retryable(ErrorKind::SessionInvalidated)
        );

        let err = Error::ElementStale {
            element_id: "e".to_string(),
            locator: "l".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn transport_and_creation_errors_are_fatal() {
        let err = Error::Transport {
            method: "POST".to_string(),
            path: "/session".to_string(),
            message: "reset".to_string(),
        };
        assert_eq!(err.disposition(), Disposition::Fatal(ErrorKind::Transport));

        let err = Error::SessionCreation("no sessionId".to_string());
        assert!(!err.is_retryable());

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(Error::from(io).kind(), ErrorKind::Io);
    }
}

//! Bounded retry and deadline helpers.
//!
//! The two policies are independent and meant to be composed:
//!
//! - [`RetryPolicy`] / [`Attempts`] bound the number of attempts and the
//!   fixed delay between them. Only errors whose [`Disposition`] is
//!   `Retryable` *and* whose kind is in the caller's retry-on set are
//!   absorbed; everything else propagates on the first failure.
//! - [`Deadline`] bounds wall-clock time regardless of how many attempts
//!   are left. A retry loop bound to a deadline never sleeps past it.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use wdrive_core::error::{Error, ErrorKind, Result};
//! use wdrive_core::policy::{Deadline, RetryPolicy};
//!
//! async fn probe() -> Result<u32> {
//!     Err(Error::ElementNotFound { target: "id 'spinner'".into(), waited: None })
//! }
//!
//! # async fn example() -> Result<()> {
//! let deadline = Deadline::after(Duration::from_secs(3), "wait for spinner");
//! let policy = RetryPolicy::new(10, Duration::from_millis(500));
//!
//! let value = deadline
//!     .run(async {
//!         let mut attempts = policy.start(&[ErrorKind::ElementNotFound]).within(&deadline);
//!         loop {
//!             match probe().await {
//!                 Ok(v) => return Ok(v),
//!                 Err(e) => attempts.backoff(e).await?,
//!             }
//!         }
//!     })
//!     .await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Disposition, Error, ErrorKind, Result};

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Fixed attempt count and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Pause between two attempts.
    #[serde(rename = "delay_ms", with = "crate::config::duration_ms")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// A policy whose attempt budget is effectively unlimited, leaving a
    /// [`Deadline`] as the only bound.
    pub const fn until_deadline(delay: Duration) -> Self {
        Self {
            attempts: u32::MAX,
            delay,
        }
    }

    /// A single attempt, no retry.
    pub const fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Begin tracking attempts for one operation.
    ///
    /// `retry_on` lists the retryable kinds this particular loop may absorb.
    pub fn start(self, retry_on: &[ErrorKind]) -> Attempts<'_> {
        Attempts {
            policy: self,
            retry_on,
            made: 0,
            deadline: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Attempt counter for a single retry loop.
///
/// Call [`backoff`](Self::backoff) with every failure. It either sleeps and
/// returns `Ok(())` (try again) or hands the error back (give up).
#[derive(Debug)]
pub struct Attempts<'a> {
    policy: RetryPolicy,
    retry_on: &'a [ErrorKind],
    made: u32,
    deadline: Option<Deadline>,
}

impl<'a> Attempts<'a> {
    /// Bind the loop to a deadline: sleeps are clipped to the time left and
    /// an expired deadline ends the loop with [`Error::Timeout`].
    pub fn within(mut self, deadline: &Deadline) -> Self {
        self.deadline = Some(deadline.clone());
        self
    }

    /// Number of failed attempts recorded so far.
    pub fn made(&self) -> u32 {
        self.made
    }

    /// Record a failed attempt and decide whether to try again.
    pub async fn backoff(&mut self, err: Error) -> Result<()> {
        self.made = self.made.saturating_add(1);

        let retryable = match err.disposition() {
            Disposition::Retryable(kind) => self.retry_on.contains(&kind),
            Disposition::Fatal(_) => false,
        };
        if !retryable {
            return Err(err);
        }

        if self.made >= self.policy.attempts {
            debug!(attempts = self.made, error = %err, "retry budget exhausted");
            return Err(err);
        }

        let mut delay = self.policy.delay;
        if let Some(deadline) = &self.deadline {
            if deadline.is_expired() {
                return Err(deadline.error());
            }
            delay = delay.min(deadline.remaining());
        }

        debug!(
            attempt = self.made,
            kind = ?err.kind(),
            delay_ms = delay.as_millis() as u64,
            "retrying"
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

/// Run `op` until it succeeds or the policy gives up.
///
/// Suitable for operations that only borrow shared state; loops that need
/// `&mut` access in between attempts drive [`Attempts`] directly.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, retry_on: &[ErrorKind], mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = policy.start(retry_on);
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => attempts.backoff(e).await?,
        }
    }
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

/// Wall-clock bound for an operation, described by what it is for.
///
/// The description ends up in the [`Error::Timeout`] message, e.g.
/// `"launch app com.example.app"`.
#[derive(Debug, Clone)]
pub struct Deadline {
    operation: String,
    limit: Duration,
    expires_at: Instant,
}

impl Deadline {
    /// A deadline `limit` from now.
    pub fn after(limit: Duration, operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            limit,
            expires_at: Instant::now() + limit,
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// The error reported when this deadline is hit.
    pub fn error(&self) -> Error {
        Error::Timeout {
            operation: self.operation.clone(),
            limit: self.limit,
        }
    }

    /// Drive `fut` to completion or abandon it at the deadline.
    ///
    /// The future is dropped at its next await point once the deadline
    /// passes; an HTTP request in flight at that moment is cancelled.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.expires_at, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = %self.operation,
                    limit_ms = self.limit.as_millis() as u64,
                    "deadline exceeded"
                );
                Err(self.error())
            }
        }
    }
}

//! Locating elements on screen.
//!
//! [`resolve`] waits for a single match: an empty result is retried under
//! the client's `find_poll` policy until the element deadline passes.
//! [`resolve_all`] asks once and returns whatever exists right now.
//!
//! Both send the [`Locator`]'s rewritten query, so the derived strategies
//! (text, label, value) are plain class-chain lookups on the wire.

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::element::ElementHandle;
use crate::error::{Error, ErrorKind, Result};
use crate::locator::Locator;
use crate::policy::Deadline;
use crate::transport::Request;

/// Key under which W3C servers return element references.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Lookups leave missing elements to the resolver's own polling.
const LOOKUP_RETRY_ON: &[ErrorKind] = &[ErrorKind::SessionInvalidated];

const POLL_RETRY_ON: &[ErrorKind] = &[ErrorKind::ElementNotFound];

/// Reads an element id from a `{"ELEMENT": ...}` reference.
pub fn element_id(reference: &Value) -> Option<&str> {
    reference
        .get("ELEMENT")
        .and_then(Value::as_str)
        .or_else(|| reference.get(W3C_ELEMENT_KEY).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
}

/// Wait for exactly one element matching `locator`.
///
/// Fails with [`Error::ElementNotFound`] carrying the element deadline once
/// it elapses without a match. A finite `find_poll` budget does not cut the
/// wait short; polling starts a new round until the deadline.
#[instrument(skip(client, locator), fields(locator = %locator), level = "debug")]
pub async fn resolve(client: &Client, locator: &Locator) -> Result<ElementHandle> {
    let id = resolve_id(client, locator).await?;
    Ok(ElementHandle::new(client.clone(), locator.clone(), id, 0))
}

/// Every element currently matching `locator`, in server order.
///
/// Never polls. No match is an empty vector, not an error.
#[instrument(skip(client, locator), fields(locator = %locator), level = "debug")]
pub async fn resolve_all(client: &Client, locator: &Locator) -> Result<Vec<ElementHandle>> {
    let request = Request::post("/elements", locator.to_body());
    let response = match client.sessions().request_with(&request, LOOKUP_RETRY_ON).await {
        Ok(response) => response,
        Err(Error::ElementNotFound { .. }) => {
            info!(%locator, count = 0, "find elements");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let references = match response.get("value") {
        Some(Value::Array(references)) => references,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(other) => {
            return Err(Error::unexpected(
                format!("find elements {locator}"),
                format!("expected a list of element references, got {other}"),
            ))
        }
    };

    let ids: Vec<String> = references
        .iter()
        .filter_map(|reference| match element_id(reference) {
            Some(id) => Some(id.to_string()),
            None => {
                debug!(%reference, "skipping reference without element id");
                None
            }
        })
        .collect();

    info!(%locator, count = ids.len(), "find elements");
    Ok(ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| ElementHandle::new(client.clone(), locator.clone(), id, index))
        .collect())
}

/// Poll for a single match and return its element id.
///
/// Also used by [`ElementHandle`] to re-resolve after a stale reference.
pub(crate) async fn resolve_id(client: &Client, locator: &Locator) -> Result<String> {
    let config = client.config();
    let deadline = Deadline::after(config.element_timeout, format!("find element {locator}"));

    // The poll budget only paces a round; the deadline alone ends the wait.
    let polled = deadline
        .run(async {
            loop {
                let mut attempts = config.find_poll.start(POLL_RETRY_ON).within(&deadline);
                loop {
                    match find_once(client, locator).await {
                        Ok(id) => return Ok(id),
                        Err(e) => match attempts.backoff(e).await {
                            Ok(()) => {}
                            Err(Error::ElementNotFound { .. }) => break,
                            Err(e) => return Err(e),
                        },
                    }
                }
                debug!(%locator, attempts = attempts.made(), "poll round exhausted, still waiting");
                tokio::time::sleep(config.find_poll.delay.min(deadline.remaining())).await;
            }
        })
        .await;

    match polled {
        Ok(id) => {
            info!(%locator, element_id = %id, "element found");
            Ok(id)
        }
        Err(Error::Timeout { limit, .. }) => Err(Error::ElementNotFound {
            target: locator.to_string(),
            waited: Some(limit),
        }),
        Err(e) => Err(e),
    }
}

async fn find_once(client: &Client, locator: &Locator) -> Result<String> {
    let not_found = || Error::ElementNotFound {
        target: locator.to_string(),
        waited: None,
    };

    let request = Request::post("/element", locator.to_body());
    let response = match client.sessions().request_with(&request, LOOKUP_RETRY_ON).await {
        Ok(response) => response,
        Err(Error::ElementNotFound { .. }) => return Err(not_found()),
        Err(e) => return Err(e),
    };

    response
        .get("value")
        .and_then(element_id)
        .map(str::to_string)
        .ok_or_else(not_found)
}

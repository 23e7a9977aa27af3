//! Stored value parsing utilities
//!
//! Error-safe parsing of persisted blobs. Old builds wrote the literal
//! strings "undefined" and "null" into some slots; those sentinels and
//! anything that fails to parse degrade to "no data" rather than an
//! error, so one corrupt entry can never take the app down.

use serde::de::DeserializeOwned;
use tracing::debug;

/// True when the raw value is a sentinel written by a broken caller.
fn is_sentinel(raw: &str) -> bool {
    matches!(raw, "undefined" | "null")
}

/// Parse a stored JSON blob, treating missing, sentinel, and malformed
/// values as absent.
pub fn safe_parse<T: DeserializeOwned>(raw: Option<String>) -> Option<T> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_sentinel(trimmed) {
        return None;
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Discarding malformed stored value");
            None
        }
    }
}

/// True when a stored token string is actually usable as a credential.
pub fn is_usable_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && !is_sentinel(trimmed)
}

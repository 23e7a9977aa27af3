//! Wire types and validated decoding
//!
//! The backend's payloads are loosely shaped: the bearer token hides
//! under one of several keys, profile fields arrive in camelCase or
//! snake_case depending on the endpoint, and counters are sometimes a
//! bare number. Everything is narrowed here into typed results so the
//! rest of the engine only ever sees validated shapes.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Keys probed for the bearer token in an auth response, in priority
/// order. The first non-empty string wins; none at all fails the login.
const TOKEN_KEYS: &[&str] = &["token", "accessToken", "access_token", "jwt", "authToken"];

/// A successfully decoded auth response.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: Option<RemoteProfile>,
}

/// The backend's view of a profile, tolerant of both camelCase and
/// snake_case spellings. Every field is optional; validation of what is
/// actually required happens at the call site.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "full_name", alias = "name")]
    pub full_name: Option<String>,
    #[serde(default, alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "business_name")]
    pub business_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "zip")]
    pub zipcode: Option<String>,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
    #[serde(default, alias = "plan_type")]
    pub plan_type: Option<String>,
    #[serde(default, alias = "has_access")]
    pub has_access: Option<bool>,
    #[serde(default, alias = "isOwner", alias = "is_owner")]
    pub owner: bool,
}

/// Billing status as reported by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingStatus {
    #[serde(default, alias = "has_access")]
    pub has_access: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, alias = "plan_type")]
    pub plan_type: Option<String>,
}

impl BillingStatus {
    /// Interpret the verdict: `hasAccess` wins, else `active`. A
    /// successful answer carrying neither field is read optimistically;
    /// transport failures never reach this point.
    pub fn resolved_access(&self) -> bool {
        self.has_access.or(self.active).unwrap_or(true)
    }
}

/// Decode an auth response: probe the token keys, then pick up the user
/// payload from the `user` field or, failing that, the top level.
pub fn decode_auth(value: &Value) -> Result<AuthSession> {
    let token = TOKEN_KEYS
        .iter()
        .find_map(|key| {
            value
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
        .ok_or(Error::MissingToken)?;

    let user = match value.get("user") {
        Some(nested) if nested.is_object() => serde_json::from_value(nested.clone()).ok(),
        _ => serde_json::from_value::<RemoteProfile>(value.clone())
            .ok()
            .filter(|p| p.email.as_deref().is_some_and(|e| !e.trim().is_empty())),
    };

    Ok(AuthSession { token, user })
}

/// Pull the payment redirect URL out of a checkout response.
pub fn decode_checkout_url(value: &Value) -> Result<String> {
    for key in ["url", "checkoutUrl", "checkout_url"] {
        if let Some(url) = value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            return Ok(url.to_string());
        }
    }
    Err(Error::MissingCheckoutUrl)
}

/// Decode a counter endpoint: a bare number, or an object with `count`.
pub fn decode_count(value: &Value) -> u64 {
    if let Some(n) = value.as_u64() {
        return n;
    }
    value.get("count").and_then(Value::as_u64).unwrap_or(0)
}

/// Best human-readable message for a failed response body.
pub fn error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|m| !m.is_empty())
            {
                return msg.to_string();
            }
        }
        if let Some(msg) = value.as_str().map(str::trim).filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 {
        return trimmed.to_string();
    }
    format!("Request failed with status {status}")
}

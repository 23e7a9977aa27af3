//! Session user and profile patch models

use serde::{Deserialize, Serialize};

/// The authoritative in-memory identity record for the active visitor.
///
/// `email` is the case-insensitive key for all per-account storage and is
/// treated as immutable for the lifetime of a session; changing it goes
/// through the dedicated change-email flow, which relocates cached data
/// and forces re-authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,

    /// Display name. Derived on demand when absent, never left blank in
    /// the UI (see [`crate::merge::display_name`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Billing verdict as last resolved. `None` means "not yet checked".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,

    /// Internal owner marker. Owners bypass billing entirely.
    #[serde(default)]
    pub owner: bool,
}

impl SessionUser {
    /// Minimal record for an account known only by id and email.
    pub fn new(id: i64, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: None,
            first_name: None,
            last_name: None,
            phone: None,
            business_name: None,
            address: None,
            city: None,
            state: None,
            zipcode: None,
            avatar_url: None,
            has_access: None,
            plan_type: None,
            owner: false,
        }
    }
}

/// A partial update to a [`SessionUser`], and the on-disk shape of a
/// profile-extra cache entry.
///
/// `None` means "field not present in this patch"; merge operations never
/// touch absent fields. Intentional clears are encoded by the caller as
/// `Some("")` on non-sensitive fields only; the sanitizer strips empty
/// values from the sensitive display fields before any merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
}

impl ProfilePatch {
    /// Patch that only sets the avatar URL.
    pub fn avatar(url: impl Into<String>) -> Self {
        Self {
            avatar_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Patch that only sets the billing verdict.
    pub fn access(has_access: bool) -> Self {
        Self {
            has_access: Some(has_access),
            ..Self::default()
        }
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Local-only per-account visibility preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityPrefs {
    #[serde(default)]
    pub show_email: bool,
    #[serde(default)]
    pub show_phone: bool,
    #[serde(default = "default_show_location")]
    pub show_location: bool,
}

fn default_show_location() -> bool {
    true
}

impl Default for VisibilityPrefs {
    fn default() -> Self {
        Self {
            show_email: false,
            show_phone: false,
            show_location: true,
        }
    }
}

//! Preferences persistence
//!
//! The global sound-notification toggle and per-account visibility
//! flags. Local-only; the backend never sees any of this.

use rusqlite::Connection;

use crate::error::Result;
use crate::models::VisibilityPrefs;
use crate::storage::kv::KvStore;
use crate::storage::parse::safe_parse;

const SOUND_KEY: &str = "prefs.sound";
const VISIBILITY_KEY_PREFIX: &str = "prefs.visibility.";

fn visibility_key(email: &str) -> String {
    format!("{VISIBILITY_KEY_PREFIX}{}", email.trim().to_lowercase())
}

/// Preferences store
pub struct PreferencesStore<'a> {
    kv: KvStore<'a>,
}

impl<'a> PreferencesStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            kv: KvStore::new(conn),
        }
    }

    /// Whether the notification sound cue is enabled. Defaults to on;
    /// the visual pulse is unconditional, sound is the opt-out layer.
    pub fn sound_enabled(&self) -> Result<bool> {
        let raw = self.kv.get(SOUND_KEY)?;
        Ok(safe_parse::<bool>(raw).unwrap_or(true))
    }

    pub fn set_sound_enabled(&self, enabled: bool) -> Result<()> {
        self.kv.set(SOUND_KEY, if enabled { "true" } else { "false" })
    }

    /// Visibility flags for an account. Absent or unreadable entries
    /// come back as defaults.
    pub fn visibility(&self, email: &str) -> Result<VisibilityPrefs> {
        let raw = self.kv.get(&visibility_key(email))?;
        Ok(safe_parse(raw).unwrap_or_default())
    }

    pub fn set_visibility(&self, email: &str, prefs: &VisibilityPrefs) -> Result<()> {
        let blob = serde_json::to_string(prefs)?;
        self.kv.set(&visibility_key(email), &blob)
    }
}

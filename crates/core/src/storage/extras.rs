//! Per-account profile-extra cache
//!
//! Fields the backend may not know yet, or that the user edited locally
//! before a save round-trip succeeded, keyed strictly by lower-cased
//! email. Switching accounts on the same machine must never leak one
//! user's cached extras into another's view, so nothing here ever reads
//! or writes outside its own account key.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::merge::{overlay, sanitize};
use crate::models::ProfilePatch;
use crate::storage::kv::KvStore;
use crate::storage::parse::safe_parse;

const EXTRA_KEY_PREFIX: &str = "profile.extra.";
/// Non-namespaced key from the schema before extras were per-account.
const LEGACY_EXTRA_KEY: &str = "profile.extra";

fn key_for(email: &str) -> String {
    format!("{EXTRA_KEY_PREFIX}{}", email.trim().to_lowercase())
}

/// Profile-extra cache store
pub struct ExtrasStore<'a> {
    kv: KvStore<'a>,
}

impl<'a> ExtrasStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            kv: KvStore::new(conn),
        }
    }

    /// Read the cached extras for an account. Absent or unreadable
    /// entries come back empty.
    pub fn load(&self, email: &str) -> Result<ProfilePatch> {
        let raw = self.kv.get(&key_for(email))?;
        Ok(safe_parse(raw).unwrap_or_default())
    }

    /// Merge a patch into the account's cached extras. The patch is
    /// sanitized first, so blank sensitive fields cannot erase cached
    /// values.
    pub fn apply(&self, email: &str, patch: &ProfilePatch) -> Result<()> {
        let safe = sanitize(patch);
        if safe.is_empty() {
            return Ok(());
        }

        let prev = self.load(email)?;
        let next = overlay(&prev, &safe);
        let blob = serde_json::to_string(&next)?;
        self.kv.set(&key_for(email), &blob)
    }

    /// Migrate the legacy global extras blob into this account's entry.
    /// First-write-wins: an existing namespaced entry is never touched.
    /// The legacy key is deleted either way; an unparseable blob can
    /// never be migrated later, so keeping it only preserves garbage.
    pub fn migrate_legacy(&self, email: &str) -> Result<()> {
        let raw = self.kv.get(LEGACY_EXTRA_KEY)?;
        if raw.is_none() {
            return Ok(());
        }

        if let Some(legacy) = safe_parse::<ProfilePatch>(raw) {
            if !self.kv.contains(&key_for(email))? {
                debug!(account = %email.trim().to_lowercase(), "Migrating legacy profile extras");
                let blob = serde_json::to_string(&sanitize(&legacy))?;
                self.kv.set(&key_for(email), &blob)?;
            }
        }

        self.kv.remove(LEGACY_EXTRA_KEY)
    }

    /// Relocate an account's extras after a change of email. The new
    /// account's existing entry wins on conflict; the old key is
    /// deleted, never duplicated.
    pub fn move_to_email(&self, old_email: &str, new_email: &str) -> Result<()> {
        let old_raw = self.kv.get(&key_for(old_email))?;
        let Some(old_extra) = safe_parse::<ProfilePatch>(old_raw) else {
            return Ok(());
        };

        let new_extra = self.load(new_email)?;
        let merged = overlay(&old_extra, &new_extra);

        let blob = serde_json::to_string(&merged)?;
        self.kv.set(&key_for(new_email), &blob)?;
        self.kv.remove(&key_for(old_email))
    }
}

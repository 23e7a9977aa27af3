//! Session slot persistence
//!
//! Canonical storage for the serialized session user and the bearer
//! token, plus migration of the deprecated keys earlier builds wrote.
//! Exactly one key is authoritative for the token; a value found under a
//! deprecated key is copied to the canonical slot and then deleted,
//! never duplicated.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::SessionUser;
use crate::storage::kv::KvStore;
use crate::storage::parse::{is_usable_token, safe_parse};

/// Canonical key for the serialized session user.
const USER_KEY: &str = "session.user";
/// Canonical key for the bearer token.
const TOKEN_KEY: &str = "session.token";
/// Deprecated keys written by earlier builds.
const LEGACY_TOKEN_KEY: &str = "token";
const LEGACY_USER_KEY: &str = "user";

/// Session slot store
pub struct SessionStore<'a> {
    kv: KvStore<'a>,
}

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            kv: KvStore::new(conn),
        }
    }

    /// Read the bearer token, migrating it from the deprecated key when
    /// the canonical slot is empty. Idempotent: after the first read the
    /// deprecated key is gone and subsequent reads are plain lookups.
    pub fn load_token(&self) -> Result<Option<String>> {
        let canonical = self
            .kv
            .get(TOKEN_KEY)?
            .filter(|t| is_usable_token(t));

        if let Some(token) = canonical {
            return Ok(Some(token));
        }

        if let Some(legacy) = self
            .kv
            .get(LEGACY_TOKEN_KEY)?
            .filter(|t| is_usable_token(t))
        {
            debug!("Migrating bearer token from deprecated storage key");
            self.kv.set(TOKEN_KEY, &legacy)?;
            self.kv.remove(LEGACY_TOKEN_KEY)?;
            return Ok(Some(legacy));
        }

        Ok(None)
    }

    /// Persist the bearer token under the canonical key.
    pub fn save_token(&self, token: &str) -> Result<()> {
        self.kv.set(TOKEN_KEY, token)
    }

    /// Read the session user blob. A malformed or sentinel value is
    /// treated as absent and the slot is cleared so it cannot poison
    /// later reads.
    pub fn load_user(&self) -> Result<Option<SessionUser>> {
        let raw = self.kv.get(USER_KEY)?;
        if raw.is_none() {
            return Ok(None);
        }

        match safe_parse::<SessionUser>(raw) {
            Some(user) => Ok(Some(user)),
            None => {
                warn!("Clearing unreadable session user slot");
                self.kv.remove(USER_KEY)?;
                Ok(None)
            }
        }
    }

    /// Persist the session user blob.
    pub fn save_user(&self, user: &SessionUser) -> Result<()> {
        let blob = serde_json::to_string(user)?;
        self.kv.set(USER_KEY, &blob)
    }

    /// Clear the session slot: canonical keys and deprecated aliases.
    /// Per-account extras are intentionally untouched.
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(USER_KEY)?;
        self.kv.remove(TOKEN_KEY)?;
        self.kv.remove(LEGACY_TOKEN_KEY)?;
        self.kv.remove(LEGACY_USER_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_token_migration_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.kv().set(LEGACY_TOKEN_KEY, "abc123").unwrap();

        let store = db.session();
        assert_eq!(store.load_token().unwrap().as_deref(), Some("abc123"));
        assert_eq!(db.kv().get(TOKEN_KEY).unwrap().as_deref(), Some("abc123"));
        assert_eq!(db.kv().get(LEGACY_TOKEN_KEY).unwrap(), None);

        // Second read is a plain lookup.
        assert_eq!(store.load_token().unwrap().as_deref(), Some("abc123"));
        assert_eq!(db.kv().get(LEGACY_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_canonical_token_wins_over_legacy() {
        let db = Database::open_in_memory().unwrap();
        db.kv().set(TOKEN_KEY, "canonical").unwrap();
        db.kv().set(LEGACY_TOKEN_KEY, "stale").unwrap();

        assert_eq!(
            db.session().load_token().unwrap().as_deref(),
            Some("canonical")
        );
    }

    #[test]
    fn test_sentinel_token_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        db.kv().set(TOKEN_KEY, "undefined").unwrap();

        assert_eq!(db.session().load_token().unwrap(), None);
    }

    #[test]
    fn test_user_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let store = db.session();

        let mut user = SessionUser::new(7, "jane@acme.com");
        user.phone = Some("555-1111".to_string());
        store.save_user(&user).unwrap();

        assert_eq!(store.load_user().unwrap(), Some(user));
    }

    #[test]
    fn test_malformed_user_blob_clears_slot() {
        let db = Database::open_in_memory().unwrap();
        db.kv().set(USER_KEY, "{definitely not json").unwrap();

        let store = db.session();
        assert_eq!(store.load_user().unwrap(), None);
        assert_eq!(db.kv().get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_sentinel_user_blob_clears_slot() {
        let db = Database::open_in_memory().unwrap();
        db.kv().set(USER_KEY, "undefined").unwrap();

        assert_eq!(db.session().load_user().unwrap(), None);
        assert_eq!(db.kv().get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn test_clear_removes_aliases_too() {
        let db = Database::open_in_memory().unwrap();
        db.kv().set(TOKEN_KEY, "t").unwrap();
        db.kv().set(LEGACY_TOKEN_KEY, "t-old").unwrap();
        db.kv().set(USER_KEY, "{}").unwrap();
        db.kv().set(LEGACY_USER_KEY, "{}").unwrap();

        db.session().clear().unwrap();

        for key in [USER_KEY, TOKEN_KEY, LEGACY_TOKEN_KEY, LEGACY_USER_KEY] {
            assert_eq!(db.kv().get(key).unwrap(), None, "{key} should be gone");
        }
    }
}

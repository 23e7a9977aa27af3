//! Session lifecycle management
//!
//! Owns the in-memory `{ user, initializing }` state and orchestrates
//! restore, login, logout, local edits, and the best-effort backend
//! rehydration. Every storage read degrades a corrupt value to "no
//! data"; every rehydration failure keeps what we had. Both local edits
//! and rehydration go through the merge engine, so whichever completes
//! last wins only the fields it actually carries, so an in-flight refresh
//! can never blank out a fresh edit.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use patron_core::merge::{self, clean_string};
use patron_core::{Database, ProfilePatch, SessionUser};
use patron_net::{ApiClient, RemoteProfile};

use crate::error::{Error, Result};

/// Cloneable handle to the session state
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    db: Arc<Mutex<Database>>,
    api: ApiClient,
    state: Mutex<SessionState>,
}

struct SessionState {
    user: Option<SessionUser>,
    initializing: bool,
}

impl SessionManager {
    pub fn new(db: Arc<Mutex<Database>>, api: ApiClient) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                db,
                api,
                state: Mutex::new(SessionState {
                    user: None,
                    initializing: true,
                }),
            }),
        }
    }

    /// Snapshot of the signed-in user, if any
    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.state.lock().unwrap().user.clone()
    }

    /// True until the first `bootstrap` pass has finished
    pub fn is_initializing(&self) -> bool {
        self.inner.state.lock().unwrap().initializing
    }

    /// True when a bearer token is attached to outgoing requests
    pub fn has_token(&self) -> bool {
        self.inner.api.has_token()
    }

    /// Restore the persisted session, then refresh it from the backend.
    /// Runs once at application start. Always ends with the
    /// initializing flag cleared, whatever happened on the way, so
    /// route guards can never hang on a loading state.
    pub async fn bootstrap(&self) {
        if let Some((email, true)) = self.restore_local() {
            self.rehydrate(&email).await;
        }

        self.inner.state.lock().unwrap().initializing = false;
        debug!("Session bootstrap complete");
    }

    /// Synchronous part of bootstrap: token migration, session blob
    /// recovery, extras merge. Returns the restored account email and
    /// whether a token was found.
    fn restore_local(&self) -> Option<(String, bool)> {
        let db = self.inner.db.lock().unwrap();

        let token = match db.session().load_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read stored token");
                None
            }
        };

        let user = match db.session().load_user() {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                None
            }
        };

        // Lay cached extras under the recovered user and write the
        // merged result back so the slot converges.
        let user = user.map(|u| {
            let extra = db.extras().load(&u.email).unwrap_or_else(|e| {
                warn!(error = %e, "Could not read profile extras");
                ProfilePatch::default()
            });
            let merged = merge::underlay(&u, &extra);
            if let Err(e) = db.session().save_user(&merged) {
                warn!(error = %e, "Could not persist restored session");
            }
            merged
        });

        match &token {
            Some(t) => self.inner.api.set_token(t),
            None => self.inner.api.clear_token(),
        }

        drop(db);

        let email = user.as_ref().map(|u| u.email.clone());
        if let Some(user) = user {
            self.inner.state.lock().unwrap().user = Some(user);
        }

        email.map(|email| (email, token.is_some()))
    }

    /// Best-effort refresh from the backend's authoritative record. A
    /// failure keeps local state untouched; a result arriving for a
    /// different account than the one now signed in is discarded.
    pub(crate) async fn rehydrate(&self, email: &str) {
        let profile = match self.inner.api.fetch_me(email).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!(error = %e, "Profile refresh failed; keeping local state");
                return;
            }
        };

        let patch = remote_patch(&profile);
        if patch.is_empty() {
            return;
        }

        let updated = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(current) = state.user.as_ref() else {
                return;
            };
            if !current.email.eq_ignore_ascii_case(email) {
                debug!("Discarding stale profile refresh for another account");
                return;
            }
            let updated = merge::merge(current, &patch);
            state.user = Some(updated.clone());
            updated
        };

        let db = self.inner.db.lock().unwrap();
        if let Err(e) = db.session().save_user(&updated) {
            warn!(error = %e, "Could not persist refreshed session");
        }
        if let Err(e) = db
            .extras()
            .apply(&updated.email, &merge::extras_snapshot(&updated))
        {
            warn!(error = %e, "Could not cache refreshed profile");
        }
    }

    /// Establish a session from an auth response. Synchronous besides a
    /// fire-and-forget backend refresh; returns once in-memory state
    /// and storage are consistent.
    pub fn login(&self, user: SessionUser, token: &str) -> Result<SessionUser> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::EmptyToken);
        }

        let merged = {
            let db = self.inner.db.lock().unwrap();

            if let Err(e) = db.extras().migrate_legacy(&user.email) {
                warn!(error = %e, "Legacy extras migration failed");
            }

            let extra = db.extras().load(&user.email).unwrap_or_default();
            let mut merged = merge::underlay(&user, &extra);
            if merged.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                merged.name = Some(merge::display_name(&merged));
            }

            db.session().save_user(&merged)?;
            db.session().save_token(token)?;
            merged
        };

        self.inner.api.set_token(token);
        {
            let mut state = self.inner.state.lock().unwrap();
            state.user = Some(merged.clone());
            state.initializing = false;
        }

        info!(account = %merged.email, "Signed in");
        self.spawn_rehydrate(merged.email.clone());
        Ok(merged)
    }

    fn spawn_rehydrate(&self, email: String) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = self.clone();
                handle.spawn(async move { manager.rehydrate(&email).await });
            }
            Err(_) => debug!("No async runtime; skipping background profile refresh"),
        }
    }

    /// End the session: in-memory state, token, and the canonical
    /// storage slots (including deprecated aliases). Per-account extras
    /// stay put so a later login by the same account recovers them.
    pub fn logout(&self) {
        self.inner.state.lock().unwrap().user = None;
        self.inner.api.clear_token();

        let db = self.inner.db.lock().unwrap();
        if let Err(e) = db.session().clear() {
            warn!(error = %e, "Could not clear stored session");
        }
        info!("Signed out");
    }

    /// Apply a profile patch to the signed-in user, persisting both the
    /// session blob and the account's extras cache so the edit survives
    /// even backend data loss. No-op when signed out.
    pub fn update_user(&self, patch: &ProfilePatch) {
        let updated = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(current) = state.user.as_ref() else {
                return;
            };
            let updated = merge::merge(current, patch);
            state.user = Some(updated.clone());
            updated
        };

        let db = self.inner.db.lock().unwrap();
        if let Err(e) = db.session().save_user(&updated) {
            warn!(error = %e, "Could not persist profile update");
        }
        if let Err(e) = db.extras().apply(&updated.email, patch) {
            warn!(error = %e, "Could not cache profile update");
        }
    }

    /// Set the avatar URL. Blank input is ignored.
    pub fn update_avatar(&self, url: &str) {
        let Some(cleaned) = clean_string(url) else {
            return;
        };
        self.update_user(&ProfilePatch::avatar(cleaned));
    }

    /// Relocate cached extras after a change of email. Must run before
    /// the forced logout of the change-email flow, or the cache is
    /// stranded under the old key.
    pub fn move_extras_to_new_email(&self, old_email: &str, new_email: &str) {
        let db = self.inner.db.lock().unwrap();
        if let Err(e) = db.extras().move_to_email(old_email, new_email) {
            warn!(error = %e, "Could not relocate profile extras");
        }
    }

    /// Change the account email. Local state is only touched after the
    /// backend confirms: extras are relocated to the new address and
    /// the session ends, forcing re-authentication.
    pub async fn change_email(&self, new_email: &str, password: &str) -> Result<()> {
        let current = self.current_user().ok_or(Error::NotSignedIn)?;

        self.inner
            .api
            .change_email(&current.email, new_email, password)
            .await?;

        self.move_extras_to_new_email(&current.email, new_email);
        self.logout();
        Ok(())
    }
}

/// Map a remote profile onto a merge patch. Empty strings survive here;
/// the merge engine's sanitizer strips them.
pub(crate) fn remote_patch(profile: &RemoteProfile) -> ProfilePatch {
    ProfilePatch {
        name: profile.full_name.clone(),
        first_name: profile.first_name.clone(),
        last_name: profile.last_name.clone(),
        phone: profile.phone.clone(),
        business_name: profile.business_name.clone(),
        address: profile.address.clone(),
        city: profile.city.clone(),
        state: profile.state.clone(),
        zipcode: profile.zipcode.clone(),
        avatar_url: profile.avatar_url.clone(),
        has_access: profile.has_access,
        plan_type: profile.plan_type.clone(),
    }
}

/// Build a session user from a remote profile. Requires an id and a
/// non-blank email; everything else is optional.
pub(crate) fn session_user_from_remote(profile: RemoteProfile) -> Option<SessionUser> {
    let id = profile.id?;
    let email = profile.email.as_deref().and_then(clean_string)?;

    let mut user = SessionUser::new(id, email);
    user.name = profile.full_name;
    user.first_name = profile.first_name;
    user.last_name = profile.last_name;
    user.phone = profile.phone;
    user.business_name = profile.business_name;
    user.address = profile.address;
    user.city = profile.city;
    user.state = profile.state;
    user.zipcode = profile.zipcode;
    user.avatar_url = profile.avatar_url;
    user.has_access = profile.has_access;
    user.plan_type = profile.plan_type;
    user.owner = profile.owner;
    Some(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Client pointed at a port nothing listens on; every call fails
    /// fast, which is exactly what the retained-on-failure paths want.
    fn dead_api() -> ApiClient {
        ApiClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap()
    }

    fn manager() -> (SessionManager, Arc<Mutex<Database>>) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let manager = SessionManager::new(db.clone(), dead_api());
        (manager, db)
    }

    #[tokio::test]
    async fn test_login_recovers_extras_and_derives_name() {
        let (manager, db) = manager();

        {
            let db = db.lock().unwrap();
            db.extras()
                .apply(
                    "jane@acme.com",
                    &ProfilePatch {
                        phone: Some("555-1111".to_string()),
                        ..ProfilePatch::default()
                    },
                )
                .unwrap();
        }

        // Backend auth payload carried an empty fullName.
        let mut incoming = SessionUser::new(7, "jane@acme.com");
        incoming.name = Some(String::new());

        let merged = manager.login(incoming, "abc123").unwrap();

        assert_eq!(merged.email, "jane@acme.com");
        assert_eq!(merged.name.as_deref(), Some("jane"));
        assert_eq!(merged.phone.as_deref(), Some("555-1111"));
        assert!(manager.has_token());

        let db = db.lock().unwrap();
        assert_eq!(
            db.session().load_token().unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn test_login_rejects_blank_token() {
        let (manager, _db) = manager();
        let err = manager
            .login(SessionUser::new(1, "a@b.c"), "   ")
            .unwrap_err();
        assert!(matches!(err, Error::EmptyToken));
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_login_migrates_legacy_extras_first_write_wins() {
        let (manager, db) = manager();

        {
            let db = db.lock().unwrap();
            db.extras()
                .apply(
                    "jane@acme.com",
                    &ProfilePatch {
                        phone: Some("555-1111".to_string()),
                        ..ProfilePatch::default()
                    },
                )
                .unwrap();
            db.kv()
                .set("profile.extra", r#"{"phone":"999-0000"}"#)
                .unwrap();
        }

        let merged = manager
            .login(SessionUser::new(7, "jane@acme.com"), "abc123")
            .unwrap();

        assert_eq!(merged.phone.as_deref(), Some("555-1111"));
        let db = db.lock().unwrap();
        assert_eq!(db.kv().get("profile.extra").unwrap(), None);
    }

    #[tokio::test]
    async fn test_bootstrap_restores_session_and_migrates_token() {
        let (manager, db) = manager();

        {
            let db = db.lock().unwrap();
            let mut user = SessionUser::new(7, "jane@acme.com");
            user.name = Some("Jane".to_string());
            db.session().save_user(&user).unwrap();
            db.kv().set("token", "legacy-token").unwrap();
            db.extras()
                .apply(
                    "jane@acme.com",
                    &ProfilePatch {
                        city: Some("Austin".to_string()),
                        ..ProfilePatch::default()
                    },
                )
                .unwrap();
        }

        assert!(manager.is_initializing());
        manager.bootstrap().await;

        assert!(!manager.is_initializing());
        assert!(manager.has_token());

        let user = manager.current_user().unwrap();
        assert_eq!(user.name.as_deref(), Some("Jane"));
        assert_eq!(user.city.as_deref(), Some("Austin"));

        let db = db.lock().unwrap();
        assert_eq!(
            db.kv().get("session.token").unwrap().as_deref(),
            Some("legacy-token")
        );
        assert_eq!(db.kv().get("token").unwrap(), None);
    }

    #[tokio::test]
    async fn test_bootstrap_degrades_corrupt_blob_to_signed_out() {
        let (manager, db) = manager();

        {
            let db = db.lock().unwrap();
            db.kv().set("session.user", "{corrupt").unwrap();
        }

        manager.bootstrap().await;

        assert!(manager.current_user().is_none());
        assert!(!manager.is_initializing());

        let db = db.lock().unwrap();
        assert_eq!(db.kv().get("session.user").unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_session_but_keeps_extras() {
        let (manager, db) = manager();

        manager
            .login(SessionUser::new(7, "jane@acme.com"), "abc123")
            .unwrap();
        manager.update_user(&ProfilePatch {
            business_name: Some("Acme".to_string()),
            ..ProfilePatch::default()
        });

        manager.logout();

        assert!(manager.current_user().is_none());
        assert!(!manager.has_token());

        let db = db.lock().unwrap();
        assert_eq!(db.session().load_token().unwrap(), None);
        assert_eq!(db.session().load_user().unwrap(), None);
        let extras = db.extras().load("jane@acme.com").unwrap();
        assert_eq!(extras.business_name.as_deref(), Some("Acme"));
    }

    #[tokio::test]
    async fn test_update_user_is_noop_when_signed_out() {
        let (manager, db) = manager();
        manager.update_user(&ProfilePatch::avatar("https://cdn/a.png"));
        assert!(manager.current_user().is_none());

        let db = db.lock().unwrap();
        assert_eq!(db.session().load_user().unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_avatar_ignores_blank_url() {
        let (manager, _db) = manager();
        let mut user = SessionUser::new(7, "jane@acme.com");
        user.avatar_url = Some("https://cdn/old.png".to_string());
        manager.login(user, "abc123").unwrap();

        manager.update_avatar("   ");

        let current = manager.current_user().unwrap();
        assert_eq!(current.avatar_url.as_deref(), Some("https://cdn/old.png"));
    }

    #[tokio::test]
    async fn test_move_extras_to_new_email() {
        let (manager, db) = manager();

        {
            let db = db.lock().unwrap();
            db.extras()
                .apply(
                    "old@x.com",
                    &ProfilePatch {
                        business_name: Some("Old Biz".to_string()),
                        ..ProfilePatch::default()
                    },
                )
                .unwrap();
        }

        manager.move_extras_to_new_email("old@x.com", "new@x.com");

        let db = db.lock().unwrap();
        let moved = db.extras().load("new@x.com").unwrap();
        assert_eq!(moved.business_name.as_deref(), Some("Old Biz"));
        assert!(db.extras().load("old@x.com").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_email_keeps_state_on_backend_failure() {
        let (manager, db) = manager();
        manager
            .login(SessionUser::new(7, "old@x.com"), "abc123")
            .unwrap();
        manager.update_user(&ProfilePatch {
            business_name: Some("Old Biz".to_string()),
            ..ProfilePatch::default()
        });

        // dead_api: the backend call fails, so nothing local changes
        let err = manager.change_email("new@x.com", "pw").await.unwrap_err();
        assert!(matches!(err, Error::Api(_)));

        assert!(manager.current_user().is_some());
        let db = db.lock().unwrap();
        let extras = db.extras().load("old@x.com").unwrap();
        assert_eq!(extras.business_name.as_deref(), Some("Old Biz"));
        assert!(db.extras().load("new@x.com").unwrap().is_empty());
    }
}

//! Patron Engine
//!
//! The client-side identity & entitlement state engine: session
//! restore and persistence, profile merging, the billing access gate,
//! and notification polling, wired over `patron-core` storage and the
//! `patron-net` backend client.
//!
//! The engine is an explicit, constructed object the shell injects
//! wherever it is needed; there are no ambient singletons, which is
//! also what makes it testable without a UI attached.

pub mod entitlement;
pub mod error;
pub mod notifier;
pub mod session;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use patron_core::{Database, EngineConfig, SessionUser};
use patron_net::ApiClient;

pub use entitlement::{EntitlementGate, RouteDecision, RouteRequirement};
pub use error::{Error, Result};
pub use notifier::{NotificationEvent, NotificationPoller, PollerHandle};
pub use session::SessionManager;

/// The assembled engine
pub struct Engine {
    config: Arc<EngineConfig>,
    db: Arc<Mutex<Database>>,
    api: ApiClient,
    pub session: SessionManager,
    pub gate: EntitlementGate,
}

impl Engine {
    /// Build an engine over the platform-default database
    pub fn new(config: EngineConfig) -> Result<Self> {
        let db = Database::open_default()?;
        Self::with_database(config, db)
    }

    /// Build an engine over an explicit database (tests, custom paths)
    pub fn with_database(config: EngineConfig, db: Database) -> Result<Self> {
        let config = Arc::new(config);
        let api = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let db = Arc::new(Mutex::new(db));

        let session = SessionManager::new(db.clone(), api.clone());
        let gate = EntitlementGate::new(session.clone(), api.clone(), config.clone());

        Ok(Self {
            config,
            db,
            api,
            session,
            gate,
        })
    }

    /// Restore any persisted session. Call once at startup.
    pub async fn bootstrap(&self) {
        self.session.bootstrap().await;
    }

    /// Authenticate with credentials and establish the local session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser> {
        let auth = self.api.login(email, password).await?;
        self.establish(email, auth).await
    }

    /// Register a new account and establish the local session.
    pub async fn sign_up(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionUser> {
        let auth = self.api.register(full_name, email, password).await?;
        self.establish(email, auth).await
    }

    async fn establish(&self, email: &str, auth: patron_net::AuthSession) -> Result<SessionUser> {
        let user = match auth.user.and_then(session::session_user_from_remote) {
            Some(user) => user,
            None => {
                // thin auth response: fetch the authoritative record
                let profile = self.api.fetch_me(email).await?;
                session::session_user_from_remote(profile).ok_or(Error::MissingProfile)?
            }
        };
        self.login(user, &auth.token)
    }

    /// Establish a session from an already-decoded auth payload. A
    /// fresh login re-opens the one-shot billing check.
    pub fn login(&self, user: SessionUser, token: &str) -> Result<SessionUser> {
        let merged = self.session.login(user, token)?;
        self.gate.reset();
        Ok(merged)
    }

    /// End the session. Per-account caches are kept.
    pub fn logout(&self) {
        self.session.logout();
    }

    /// Change the account email; on success the session ends and the
    /// caller re-authenticates under the new address.
    pub async fn change_email(&self, new_email: &str, password: &str) -> Result<()> {
        self.session.change_email(new_email, password).await
    }

    /// Build (not start) a notification poller bound to this engine
    pub fn notifier(&self) -> NotificationPoller {
        NotificationPoller::new(
            self.session.clone(),
            self.api.clone(),
            self.db.clone(),
            &self.config,
        )
    }

    /// Storage handle (preferences, visibility flags)
    pub fn database(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }

    /// Backend client handle
    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

//! Entitlement gate
//!
//! Decides, per navigation, whether the signed-in user may reach
//! billing-gated routes. One backend check per app session: the
//! `billing_checked` flag is set in every terminal path and only
//! `reset()` (a fresh login) re-opens it, so navigation can never spam
//! the billing endpoint or loop a paying user back to the paywall. A
//! transport failure denies access: billing must fail closed, unlike
//! profile data.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use patron_core::models::{AccessReason, EntitlementDecision};
use patron_core::vip::{is_lifetime_plan, is_vip};
use patron_core::{EngineConfig, ProfilePatch, SessionUser};
use patron_net::ApiClient;

use crate::error::{Error, Result};
use crate::session::SessionManager;

/// What a route demands of the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    /// Reachable by anyone.
    Public,
    /// Requires a session, but not entitlement (profile, billing pages).
    SignedIn,
    /// Requires a session and resolved access.
    Entitled,
}

/// Outcome of guarding a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Session restore still running; show a loading state.
    Pending,
    RedirectToSignIn,
    /// Send to the activation screen, preserving the requested path so
    /// a successful purchase can return there.
    RedirectToActivate { return_to: String },
}

/// Per-session access gate
#[derive(Clone)]
pub struct EntitlementGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    session: SessionManager,
    api: ApiClient,
    config: Arc<EngineConfig>,
    billing_checked: Mutex<bool>,
}

impl EntitlementGate {
    pub fn new(session: SessionManager, api: ApiClient, config: Arc<EngineConfig>) -> Self {
        Self {
            inner: Arc::new(GateInner {
                session,
                api,
                config,
                billing_checked: Mutex::new(false),
            }),
        }
    }

    /// Forget the billing verdict. Invoked on every fresh login;
    /// nothing else re-opens the check for the lifetime of the app
    /// session.
    pub fn reset(&self) {
        *self.inner.billing_checked.lock().unwrap() = false;
    }

    /// True once a billing verdict (success or failure) has landed.
    pub fn billing_checked(&self) -> bool {
        *self.inner.billing_checked.lock().unwrap()
    }

    fn mark_checked(&self) {
        *self.inner.billing_checked.lock().unwrap() = true;
    }

    /// Resolve whether the current visitor may pass billing-gated
    /// routes. Evaluated in order, first match wins: signed out, VIP,
    /// development bypass, then the one-shot backend check.
    pub async fn resolve(&self) -> EntitlementDecision {
        let Some(user) = self.inner.session.current_user() else {
            return EntitlementDecision::denied(AccessReason::SignedOut);
        };

        if is_vip(&user, &self.inner.config.vip_emails) {
            // the cached verdict may disagree; VIP wins
            if user.has_access != Some(true) {
                let mut patch = ProfilePatch::access(true);
                if user.plan_type.is_none() {
                    patch.plan_type = Some("owner".to_string());
                }
                self.inner.session.update_user(&patch);
            }
            self.mark_checked();
            return EntitlementDecision::granted(AccessReason::Vip);
        }

        if self.inner.config.development {
            if user.has_access != Some(true) {
                self.inner.session.update_user(&ProfilePatch::access(true));
            }
            self.mark_checked();
            debug!("Development bypass: granting access without billing check");
            return EntitlementDecision::granted(AccessReason::Development);
        }

        if self.billing_checked() {
            let has_access = self
                .inner
                .session
                .current_user()
                .and_then(|u| u.has_access)
                .unwrap_or(false);
            return EntitlementDecision {
                has_access,
                reason: AccessReason::BackendResolved,
            };
        }

        let decision = self.check_backend(&user).await;
        // terminal whatever happened, so the UI is never stuck loading
        self.mark_checked();
        decision
    }

    async fn check_backend(&self, user: &SessionUser) -> EntitlementDecision {
        // A lifetime plan the local record missed ends the check early.
        if let Ok(profile) = self.inner.api.fetch_me(&user.email).await {
            if let Some(plan) = profile.plan_type.as_deref() {
                if is_lifetime_plan(plan) {
                    let mut patch = ProfilePatch::access(true);
                    patch.plan_type = Some(plan.to_string());
                    self.inner.session.update_user(&patch);
                    return EntitlementDecision::granted(AccessReason::LifetimePlan);
                }
            }
        }

        match self.inner.api.billing_status().await {
            Ok(status) => {
                let has_access = status.resolved_access();
                let mut patch = ProfilePatch::access(has_access);
                patch.plan_type = status.plan_type.clone();
                self.inner.session.update_user(&patch);
                EntitlementDecision {
                    has_access,
                    reason: AccessReason::BackendResolved,
                }
            }
            Err(e) => {
                warn!(error = %e, "Billing status unavailable; denying access");
                self.inner.session.update_user(&ProfilePatch::access(false));
                EntitlementDecision::denied(AccessReason::BackendFailed)
            }
        }
    }

    /// Gate a navigation to `path`.
    pub async fn guard(&self, path: &str, requirement: RouteRequirement) -> RouteDecision {
        if requirement == RouteRequirement::Public {
            return RouteDecision::Allow;
        }

        if self.inner.session.is_initializing() {
            return RouteDecision::Pending;
        }

        let Some(user) = self.inner.session.current_user() else {
            return RouteDecision::RedirectToSignIn;
        };

        if requirement == RouteRequirement::SignedIn {
            return RouteDecision::Allow;
        }

        let decision = self.resolve().await;
        if decision.has_access || is_vip(&user, &self.inner.config.vip_emails) {
            RouteDecision::Allow
        } else {
            RouteDecision::RedirectToActivate {
                return_to: path.to_string(),
            }
        }
    }

    /// Start the checkout hand-off: lock access locally, then ask the
    /// backend for the payment redirect URL. Access stays locked until
    /// the payment provider confirms through the backend.
    pub async fn start_checkout(&self, return_to: &str) -> Result<String> {
        let user = self
            .inner
            .session
            .current_user()
            .ok_or(Error::NotSignedIn)?;

        self.inner.session.update_user(&ProfilePatch::access(false));

        let url = self.inner.api.checkout(&user.email, return_to).await?;
        Ok(url)
    }
}

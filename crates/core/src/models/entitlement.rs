//! Entitlement decision model

use serde::{Deserialize, Serialize};

/// Why an entitlement decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessReason {
    /// No signed-in user; gated routes are unreachable anyway.
    SignedOut,
    /// VIP classification (allow-listed email, lifetime plan, or owner).
    Vip,
    /// Development environment bypass.
    Development,
    /// The profile refresh reported a lifetime-free plan.
    LifetimePlan,
    /// The billing backend answered.
    BackendResolved,
    /// The billing backend was unreachable; access fails closed.
    BackendFailed,
}

/// A derived, non-persisted access verdict.
///
/// Computed fresh for every consumer; only the underlying `has_access`
/// field on the session user and the gate's one-shot checked flag carry
/// state between evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementDecision {
    pub has_access: bool,
    pub reason: AccessReason,
}

impl EntitlementDecision {
    pub fn granted(reason: AccessReason) -> Self {
        Self {
            has_access: true,
            reason,
        }
    }

    pub fn denied(reason: AccessReason) -> Self {
        Self {
            has_access: false,
            reason,
        }
    }
}

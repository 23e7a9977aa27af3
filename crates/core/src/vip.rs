//! VIP classification
//!
//! Single predicate deciding whether a user is exempt from billing
//! checks. Every consumer (entitlement gate, UI badges) goes through
//! this so they can never disagree about who is VIP.

use crate::models::SessionUser;

/// Plan types that grant access for life without a billing lookup.
const LIFETIME_PLANS: &[&str] = &["lifetime", "free_lifetime", "owner"];

/// Check whether a plan type string marks a lifetime-free plan.
pub fn is_lifetime_plan(plan_type: &str) -> bool {
    let plan = plan_type.trim().to_ascii_lowercase();
    LIFETIME_PLANS.contains(&plan.as_str())
}

/// Check whether a user is VIP: internal owner marker, lifetime plan,
/// or allow-listed email (case-insensitive).
pub fn is_vip(user: &SessionUser, allowlist: &[String]) -> bool {
    if user.owner {
        return true;
    }

    if let Some(plan) = &user.plan_type {
        if is_lifetime_plan(plan) {
            return true;
        }
    }

    let email = user.email.trim().to_ascii_lowercase();
    if email.is_empty() {
        return false;
    }

    allowlist
        .iter()
        .any(|allowed| allowed.trim().to_ascii_lowercase() == email)
}

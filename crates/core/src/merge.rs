//! Profile merge engine
//!
//! Pure functions combining a base profile with a patch. The contract
//! that everything else leans on: an empty or blank value never
//! overwrites a known-good one. Both the session store's rehydration
//! path and user-initiated edits go through these functions, so a slow
//! backend refresh completing after a local edit cannot blank that edit
//! out: its absent/empty fields are stripped before the merge.

use crate::models::{ProfilePatch, SessionUser};

/// Trim a string, mapping blank results to `None`.
pub fn clean_string(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn clean_opt(value: &Option<String>) -> Option<String> {
    value.as_deref().and_then(clean_string)
}

/// Sanitize a patch: the sensitive display fields (name, avatar URL,
/// first/last name) are trimmed, and removed from the patch entirely if
/// blank, so the base value survives the merge untouched. All other
/// fields pass through as-is, including intentional clears.
pub fn sanitize(patch: &ProfilePatch) -> ProfilePatch {
    let mut next = patch.clone();
    next.name = clean_opt(&patch.name);
    next.avatar_url = clean_opt(&patch.avatar_url);
    next.first_name = clean_opt(&patch.first_name);
    next.last_name = clean_opt(&patch.last_name);
    next
}

fn override_field(dst: &mut Option<String>, src: &Option<String>) {
    if let Some(v) = src {
        *dst = Some(v.clone());
    }
}

/// Merge a sanitized patch over a base user. Present patch fields win;
/// absent fields keep the base value. Identity fields (`id`, `email`,
/// `owner`) are never part of a patch and pass through unchanged.
pub fn merge(base: &SessionUser, patch: &ProfilePatch) -> SessionUser {
    let safe = sanitize(patch);
    let mut user = base.clone();

    override_field(&mut user.name, &safe.name);
    override_field(&mut user.first_name, &safe.first_name);
    override_field(&mut user.last_name, &safe.last_name);
    override_field(&mut user.phone, &safe.phone);
    override_field(&mut user.business_name, &safe.business_name);
    override_field(&mut user.address, &safe.address);
    override_field(&mut user.city, &safe.city);
    override_field(&mut user.state, &safe.state);
    override_field(&mut user.zipcode, &safe.zipcode);
    override_field(&mut user.avatar_url, &safe.avatar_url);

    if let Some(v) = safe.has_access {
        user.has_access = Some(v);
    }
    override_field(&mut user.plan_type, &safe.plan_type);

    user
}

fn fill_field(dst: &mut Option<String>, src: &Option<String>) {
    let blank = dst.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank {
        if let Some(v) = clean_opt(src) {
            *dst = Some(v);
        }
    }
}

/// Lay cached extras *under* a user: extras fill gaps only and never
/// override a non-blank user field. Used when restoring a session and
/// when logging in, so locally cached edits survive a thin backend
/// record without ever clobbering a fresher one.
pub fn underlay(user: &SessionUser, extra: &ProfilePatch) -> SessionUser {
    let mut merged = user.clone();

    fill_field(&mut merged.name, &extra.name);
    fill_field(&mut merged.first_name, &extra.first_name);
    fill_field(&mut merged.last_name, &extra.last_name);
    fill_field(&mut merged.phone, &extra.phone);
    fill_field(&mut merged.business_name, &extra.business_name);
    fill_field(&mut merged.address, &extra.address);
    fill_field(&mut merged.city, &extra.city);
    fill_field(&mut merged.state, &extra.state);
    fill_field(&mut merged.zipcode, &extra.zipcode);
    fill_field(&mut merged.avatar_url, &extra.avatar_url);

    if merged.has_access.is_none() {
        merged.has_access = extra.has_access;
    }
    fill_field(&mut merged.plan_type, &extra.plan_type);

    merged
}

/// Overlay one patch onto another (for cache entries): present fields of
/// `patch` win, the rest keep `base`. Callers sanitize `patch` first
/// when it comes from outside.
pub fn overlay(base: &ProfilePatch, patch: &ProfilePatch) -> ProfilePatch {
    let mut next = base.clone();

    override_field(&mut next.name, &patch.name);
    override_field(&mut next.first_name, &patch.first_name);
    override_field(&mut next.last_name, &patch.last_name);
    override_field(&mut next.phone, &patch.phone);
    override_field(&mut next.business_name, &patch.business_name);
    override_field(&mut next.address, &patch.address);
    override_field(&mut next.city, &patch.city);
    override_field(&mut next.state, &patch.state);
    override_field(&mut next.zipcode, &patch.zipcode);
    override_field(&mut next.avatar_url, &patch.avatar_url);

    if let Some(v) = patch.has_access {
        next.has_access = Some(v);
    }
    override_field(&mut next.plan_type, &patch.plan_type);

    next
}

/// Derive a display name: explicit name, else first + last joined by a
/// single space, else the local part of the email. Total for any user
/// with an email; never mutates stored state on its own.
pub fn display_name(user: &SessionUser) -> String {
    if let Some(name) = clean_opt(&user.name) {
        return name;
    }

    let parts: Vec<String> = [&user.first_name, &user.last_name]
        .into_iter()
        .filter_map(clean_opt)
        .collect();
    if !parts.is_empty() {
        return parts.join(" ");
    }

    let email = user.email.trim();
    email.split('@').next().unwrap_or(email).to_string()
}

/// The display fields worth caching per-account after a successful
/// backend refresh, snapshotted from the merged user.
pub fn extras_snapshot(user: &SessionUser) -> ProfilePatch {
    ProfilePatch {
        name: user.name.clone(),
        avatar_url: user.avatar_url.clone(),
        phone: user.phone.clone(),
        business_name: user.business_name.clone(),
        city: user.city.clone(),
        state: user.state.clone(),
        ..ProfilePatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_user() -> SessionUser {
        let mut u = SessionUser::new(7, "jane@acme.com");
        u.name = Some("Jane Doe".to_string());
        u.avatar_url = Some("https://cdn.example/jane.png".to_string());
        u.phone = Some("555-1111".to_string());
        u
    }

    #[test]
    fn test_blank_patch_never_destroys_sensitive_fields() {
        let base = base_user();
        for bad in ["", "   "] {
            let patch = ProfilePatch {
                name: Some(bad.to_string()),
                avatar_url: Some(bad.to_string()),
                ..ProfilePatch::default()
            };
            let merged = merge(&base, &patch);
            assert_eq!(merged.name, base.name);
            assert_eq!(merged.avatar_url, base.avatar_url);
        }

        // Absent fields are equally harmless.
        let merged = merge(&base, &ProfilePatch::default());
        assert_eq!(merged, base);
    }

    #[test]
    fn test_non_empty_avatar_always_wins() {
        let base = base_user();
        let patch = ProfilePatch::avatar("https://cdn.example/new.png");
        let merged = merge(&base, &patch);
        assert_eq!(
            merged.avatar_url.as_deref(),
            Some("https://cdn.example/new.png")
        );
    }

    #[test]
    fn test_sensitive_values_are_trimmed_before_merge() {
        let base = base_user();
        let patch = ProfilePatch {
            name: Some("  Janet  ".to_string()),
            ..ProfilePatch::default()
        };
        let merged = merge(&base, &patch);
        assert_eq!(merged.name.as_deref(), Some("Janet"));
    }

    #[test]
    fn test_non_sensitive_fields_accept_intentional_clears() {
        let base = base_user();
        let patch = ProfilePatch {
            phone: Some(String::new()),
            ..ProfilePatch::default()
        };
        let merged = merge(&base, &patch);
        assert_eq!(merged.phone.as_deref(), Some(""));
    }

    #[test]
    fn test_underlay_fills_gaps_only() {
        let mut user = SessionUser::new(7, "jane@acme.com");
        user.name = Some("Jane".to_string());

        let extra = ProfilePatch {
            name: Some("Cached Name".to_string()),
            phone: Some("555-1111".to_string()),
            ..ProfilePatch::default()
        };

        let merged = underlay(&user, &extra);
        assert_eq!(merged.name.as_deref(), Some("Jane"));
        assert_eq!(merged.phone.as_deref(), Some("555-1111"));
    }

    #[test]
    fn test_underlay_treats_blank_as_gap() {
        let mut user = SessionUser::new(7, "jane@acme.com");
        user.name = Some("   ".to_string());

        let extra = ProfilePatch {
            name: Some("Cached Name".to_string()),
            ..ProfilePatch::default()
        };

        let merged = underlay(&user, &extra);
        assert_eq!(merged.name.as_deref(), Some("Cached Name"));
    }

    #[test]
    fn test_display_name_priority_order() {
        let mut u = SessionUser::new(1, "local@domain.com");
        assert_eq!(display_name(&u), "local");

        u.first_name = Some("Ada".to_string());
        assert_eq!(display_name(&u), "Ada");

        u.last_name = Some("Lovelace".to_string());
        assert_eq!(display_name(&u), "Ada Lovelace");

        u.name = Some("A. Lovelace".to_string());
        assert_eq!(display_name(&u), "A. Lovelace");
    }

    #[test]
    fn test_display_name_without_at_sign_uses_whole_email() {
        let u = SessionUser::new(1, "not-an-email");
        assert_eq!(display_name(&u), "not-an-email");
    }

    #[test]
    fn test_overlay_patch_wins_where_present() {
        let prev = ProfilePatch {
            phone: Some("555-1111".to_string()),
            city: Some("Austin".to_string()),
            ..ProfilePatch::default()
        };
        let patch = ProfilePatch {
            phone: Some("555-2222".to_string()),
            ..ProfilePatch::default()
        };

        let next = overlay(&prev, &patch);
        assert_eq!(next.phone.as_deref(), Some("555-2222"));
        assert_eq!(next.city.as_deref(), Some("Austin"));
    }
}

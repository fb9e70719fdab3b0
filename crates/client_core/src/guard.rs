use shared::domain::Profile;

use crate::session::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    RedirectToLogin,
    PermissionDenied,
}

/// Decides whether a staff-only surface may be shown. While the session
/// is still loading and no profile is known yet, rendering proceeds.
pub fn evaluate(profile: Option<&Profile>, is_loading: bool) -> GuardDecision {
    match profile {
        None if !is_loading => GuardDecision::RedirectToLogin,
        Some(profile) if !profile.role.is_staff() => GuardDecision::PermissionDenied,
        _ => GuardDecision::Render,
    }
}

pub fn evaluate_snapshot(snapshot: &SessionSnapshot) -> GuardDecision {
    evaluate(snapshot.current_profile.as_ref(), snapshot.is_loading)
}

#[cfg(test)]
#[path = "tests/guard_tests.rs"]
mod tests;

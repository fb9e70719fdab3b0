use super::*;
use shared::domain::Role;

fn profile(role: Role) -> Profile {
    Profile {
        id: "7d4e1c58-2b0f-4a7e-9f0e-3b1f4c2d9a10".to_string(),
        name: "Marta".to_string(),
        role,
    }
}

#[test]
fn staff_roles_render() {
    for role in Role::STAFF {
        assert_eq!(evaluate(Some(&profile(role)), false), GuardDecision::Render);
    }
}

#[test]
fn other_roles_are_denied() {
    for role in [Role::Customer, Role::Delivery] {
        assert_eq!(
            evaluate(Some(&profile(role)), false),
            GuardDecision::PermissionDenied
        );
    }
}

#[test]
fn missing_profile_redirects_once_loading_is_done() {
    assert_eq!(evaluate(None, false), GuardDecision::RedirectToLogin);
    assert_eq!(evaluate(None, true), GuardDecision::Render);
}

#[test]
fn known_non_staff_profile_is_denied_even_while_loading() {
    assert_eq!(
        evaluate(Some(&profile(Role::Customer)), true),
        GuardDecision::PermissionDenied
    );
}

#[test]
fn snapshot_is_evaluated_like_its_parts() {
    let snapshot = SessionSnapshot {
        current_user: None,
        current_profile: Some(profile(Role::Kitchen)),
        is_loading: false,
    };
    assert_eq!(evaluate_snapshot(&snapshot), GuardDecision::Render);
}

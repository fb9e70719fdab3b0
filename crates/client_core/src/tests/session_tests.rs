use std::time::Duration;

use super::*;
use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{AuthUserId, Collection, UserAccountId},
    error::{ApiException, ErrorCode},
    protocol::{AuthSession, JsonObject},
};
use tokio::sync::{Notify, Semaphore};

use crate::{
    gateway::MemoryGateway,
    guard::{evaluate_snapshot, GuardDecision},
};

const EMAIL: &str = "cocina@zahub.test";
const PASSWORD: &str = "horno-caliente";

fn profile_row(auth_user_id: AuthUserId, name: &str, role: &str) -> JsonObject {
    match json!({
        "id": UserAccountId::new_random().to_string(),
        "auth_user_id": auth_user_id.to_string(),
        "nombre": name,
        "email": EMAIL,
        "rol": role,
        "activo": true,
        "created_at": "2024-03-10T08:30:00Z",
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

async fn gateway_with_account() -> (Arc<MemoryGateway>, AuthUserId) {
    let gateway = Arc::new(MemoryGateway::new());
    let user_id = AuthUserId::new_random();
    gateway.add_account(EMAIL, PASSWORD, user_id).await;
    (gateway, user_id)
}

async fn wait_for(
    rx: &mut watch::Receiver<SessionSnapshot>,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("session store dropped");
        }
    })
    .await
    .expect("timed out waiting for session state")
}

#[tokio::test]
async fn starts_loading_and_settles_signed_out() {
    let (gateway, _) = gateway_with_account().await;
    let store = SessionStore::new(gateway, ProfileFallback::default());
    assert!(store.snapshot().is_loading);

    store.init().await;

    let snapshot = store.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.current_user.is_none());
    assert_eq!(evaluate_snapshot(&snapshot), GuardDecision::RedirectToLogin);
    store.teardown().await;
}

#[tokio::test]
async fn bootstraps_existing_session_with_profile_row() {
    let (gateway, user_id) = gateway_with_account().await;
    gateway
        .seed(Collection::Users, vec![profile_row(user_id, "Camila", "COCINA")])
        .await;
    gateway.sign_in(EMAIL, PASSWORD).await.expect("sign in");
    let store = SessionStore::new(gateway, ProfileFallback::default());

    store.init().await;

    let snapshot = store.snapshot();
    let profile = snapshot.current_profile.clone().expect("profile");
    assert_eq!(profile.name, "Camila");
    assert_eq!(profile.role, Role::Kitchen);
    assert_eq!(snapshot.current_user.map(|u| u.id), Some(user_id));
    assert_eq!(evaluate_snapshot(&store.snapshot()), GuardDecision::Render);
    store.teardown().await;
}

#[tokio::test]
async fn missing_profile_row_uses_restricted_fallback() {
    let (gateway, user_id) = gateway_with_account().await;
    let store = SessionStore::new(gateway, ProfileFallback::Restricted);

    store
        .establish(AuthUser {
            id: user_id,
            email: Some(EMAIL.to_string()),
        })
        .await;

    let snapshot = store.snapshot();
    let profile = snapshot.current_profile.clone().expect("profile");
    assert_eq!(profile.id, user_id.to_string());
    assert_eq!(profile.name, EMAIL);
    assert_eq!(profile.role, Role::Customer);
    assert_eq!(evaluate_snapshot(&snapshot), GuardDecision::PermissionDenied);
}

#[tokio::test]
async fn failed_lookup_can_fall_back_to_administrator() {
    let (gateway, user_id) = gateway_with_account().await;
    gateway
        .fail_lists(Some(ApiException::new(ErrorCode::Internal, "relation does not exist")))
        .await;
    let store = SessionStore::new(gateway, ProfileFallback::Administrator);

    store
        .establish(AuthUser {
            id: user_id,
            email: None,
        })
        .await;

    let profile = store.snapshot().current_profile.expect("profile");
    assert_eq!(profile.name, "User");
    assert_eq!(profile.role, Role::Admin);
}

#[tokio::test]
async fn follows_sign_in_and_sign_out_events() {
    let (gateway, user_id) = gateway_with_account().await;
    gateway
        .seed(Collection::Users, vec![profile_row(user_id, "Camila", "CAJERO")])
        .await;
    let store = SessionStore::new(gateway.clone(), ProfileFallback::default());
    let mut rx = store.subscribe();
    store.init().await;

    gateway.sign_in(EMAIL, PASSWORD).await.expect("sign in");
    let signed_in = wait_for(&mut rx, |s| s.current_profile.is_some() && !s.is_loading).await;
    assert_eq!(
        signed_in.current_profile.map(|p| p.role),
        Some(Role::Cashier)
    );

    gateway.sign_out().await.expect("sign out");
    let signed_out = wait_for(&mut rx, |s| s.current_user.is_none()).await;
    assert!(signed_out.current_profile.is_none());
    assert!(!signed_out.is_loading);
    store.teardown().await;
}

#[tokio::test]
async fn teardown_stops_following_events() {
    let (gateway, _) = gateway_with_account().await;
    let store = SessionStore::new(gateway.clone(), ProfileFallback::default());
    store.init().await;
    store.teardown().await;

    gateway.sign_in(EMAIL, PASSWORD).await.expect("sign in");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(store.snapshot().current_user.is_none());
}

/// Holds every profile lookup until `release` hands out a permit.
struct HeldLookups {
    inner: Arc<MemoryGateway>,
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

#[async_trait]
impl RemoteGateway for HeldLookups {
    async fn list_records(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<Vec<JsonObject>, ApiException> {
        self.entered.notify_one();
        self.release.acquire().await.expect("release gate").forget();
        self.inner.list_records(collection, query).await
    }

    async fn insert_record(
        &self,
        collection: Collection,
        fields: JsonObject,
    ) -> Result<JsonObject, ApiException> {
        self.inner.insert_record(collection, fields).await
    }

    async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        fields: JsonObject,
    ) -> Result<(), ApiException> {
        self.inner.update_record(collection, id, fields).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ApiException> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), ApiException> {
        self.inner.sign_out().await
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, ApiException> {
        self.inner.current_user().await
    }

    fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.subscribe_session()
    }
}

#[tokio::test]
async fn clear_during_profile_lookup_stays_signed_out() {
    let (memory, user_id) = gateway_with_account().await;
    memory
        .seed(Collection::Users, vec![profile_row(user_id, "Ana", "ADMIN")])
        .await;
    let user = memory.sign_in(EMAIL, PASSWORD).await.expect("sign in").user;
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Semaphore::new(0));
    let gateway = Arc::new(HeldLookups {
        inner: memory,
        entered: entered.clone(),
        release: release.clone(),
    });
    let store = SessionStore::new(gateway, ProfileFallback::Administrator);

    let establishing = tokio::spawn({
        let store = store.clone();
        async move { store.establish(user).await }
    });
    entered.notified().await;
    store.clear();
    release.add_permits(1);
    establishing.await.expect("establish task");

    let snapshot = store.snapshot();
    assert!(snapshot.current_user.is_none());
    assert!(snapshot.current_profile.is_none());
    assert!(!snapshot.is_loading);
    assert_eq!(evaluate_snapshot(&snapshot), GuardDecision::RedirectToLogin);
}

#[tokio::test]
async fn newer_establish_wins_over_a_slower_one() {
    let (memory, user_id) = gateway_with_account().await;
    memory
        .seed(Collection::Users, vec![profile_row(user_id, "Ana", "ADMIN")])
        .await;
    let user = memory.sign_in(EMAIL, PASSWORD).await.expect("sign in").user;
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Semaphore::new(0));
    let gateway = Arc::new(HeldLookups {
        inner: memory,
        entered: entered.clone(),
        release: release.clone(),
    });
    let store = SessionStore::new(gateway, ProfileFallback::Restricted);

    let first = tokio::spawn({
        let store = store.clone();
        let user = user.clone();
        async move { store.establish(user).await }
    });
    entered.notified().await;
    store.clear();
    let second = tokio::spawn({
        let store = store.clone();
        async move { store.establish(user).await }
    });
    entered.notified().await;
    release.add_permits(2);
    first.await.expect("first establish");
    second.await.expect("second establish");

    let snapshot = store.snapshot();
    assert!(snapshot.current_user.is_some());
    assert_eq!(snapshot.current_profile.map(|p| p.role), Some(Role::Admin));
    assert!(!snapshot.is_loading);
}

#[test]
fn fallback_policy_parses_from_config_values() {
    assert_eq!(
        "administrator".parse::<ProfileFallback>().expect("parse"),
        ProfileFallback::Administrator
    );
    assert_eq!(
        " Restricted ".parse::<ProfileFallback>().expect("parse"),
        ProfileFallback::Restricted
    );
    assert!("superuser".parse::<ProfileFallback>().is_err());
}

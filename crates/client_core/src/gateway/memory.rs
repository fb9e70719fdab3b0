use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use shared::{
    domain::{AuthUserId, Collection},
    error::{ApiException, ErrorCode},
    protocol::{AuthSession, AuthUser, JsonObject, ListQuery, SessionEvent},
};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use super::RemoteGateway;

struct Account {
    password: String,
    user: AuthUser,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<Collection, Vec<JsonObject>>,
    accounts: HashMap<String, Account>,
    session: Option<AuthSession>,
    list_failure: Option<ApiException>,
    update_failure: Option<ApiException>,
    updates: Vec<(Collection, String, JsonObject)>,
    list_calls: usize,
}

/// In-process backend with the same observable contract as the hosted one.
/// Failures can be switched on per operation kind.
pub struct MemoryGateway {
    inner: Mutex<MemoryState>,
    session_events: broadcast::Sender<SessionEvent>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (session_events, _) = broadcast::channel(16);
        Self {
            inner: Mutex::new(MemoryState::default()),
            session_events,
        }
    }

    pub async fn seed(&self, collection: Collection, rows: Vec<JsonObject>) {
        self.inner
            .lock()
            .await
            .collections
            .entry(collection)
            .or_default()
            .extend(rows);
    }

    pub async fn rows(&self, collection: Collection) -> Vec<JsonObject> {
        self.inner
            .lock()
            .await
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn add_account(&self, email: &str, password: &str, user_id: AuthUserId) {
        self.inner.lock().await.accounts.insert(
            email.to_ascii_lowercase(),
            Account {
                password: password.to_string(),
                user: AuthUser {
                    id: user_id,
                    email: Some(email.to_string()),
                },
            },
        );
    }

    pub async fn fail_updates(&self, failure: Option<ApiException>) {
        self.inner.lock().await.update_failure = failure;
    }

    pub async fn fail_lists(&self, failure: Option<ApiException>) {
        self.inner.lock().await.list_failure = failure;
    }

    pub async fn updates(&self) -> Vec<(Collection, String, JsonObject)> {
        self.inner.lock().await.updates.clone()
    }

    pub async fn list_calls(&self) -> usize {
        self.inner.lock().await.list_calls
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Null) | None) => Ordering::Greater,
        (Some(a), Some(b)) => text_of(a).cmp(&text_of(b)),
    }
}

/// Plain column lists are projected; embedded-resource selects return
/// whole rows.
fn project(row: &JsonObject, select: &str) -> JsonObject {
    if select == "*" || select.contains('(') {
        return row.clone();
    }
    select
        .split(',')
        .map(str::trim)
        .filter_map(|column| row.get(column).map(|v| (column.to_string(), v.clone())))
        .collect()
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn list_records(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<Vec<JsonObject>, ApiException> {
        let mut guard = self.inner.lock().await;
        guard.list_calls += 1;
        if let Some(failure) = &guard.list_failure {
            return Err(failure.clone());
        }
        let mut rows: Vec<JsonObject> = guard
            .collections
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query.filters.iter().all(|(column, expected)| {
                            row.get(column).map(text_of).as_deref() == Some(expected.as_str())
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows
            .iter()
            .map(|row| project(row, query.select_columns()))
            .collect())
    }

    async fn insert_record(
        &self,
        collection: Collection,
        mut fields: JsonObject,
    ) -> Result<JsonObject, ApiException> {
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        let mut guard = self.inner.lock().await;
        guard
            .collections
            .entry(collection)
            .or_default()
            .push(fields.clone());
        Ok(fields)
    }

    async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        fields: JsonObject,
    ) -> Result<(), ApiException> {
        let mut guard = self.inner.lock().await;
        if let Some(failure) = &guard.update_failure {
            return Err(failure.clone());
        }
        let row = guard
            .collections
            .get_mut(&collection)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.get("id").map(text_of).as_deref() == Some(id))
            })
            .ok_or_else(|| {
                ApiException::new(ErrorCode::NotFound, format!("no {collection} row with id {id}"))
            })?;
        row.extend(fields.clone());
        guard.updates.push((collection, id.to_string(), fields));
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ApiException> {
        let mut guard = self.inner.lock().await;
        let user = match guard.accounts.get(&email.to_ascii_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => {
                return Err(ApiException::new(
                    ErrorCode::Unauthorized,
                    "Invalid login credentials",
                ))
            }
        };
        let session = AuthSession {
            access_token: format!("memory-{}", Uuid::new_v4()),
            refresh_token: None,
            expires_at: None,
            user: user.clone(),
        };
        guard.session = Some(session.clone());
        drop(guard);
        let _ = self.session_events.send(SessionEvent::SignedIn(user));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ApiException> {
        self.inner.lock().await.session = None;
        let _ = self.session_events.send(SessionEvent::SignedOut);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, ApiException> {
        Ok(self
            .inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| session.user.clone()))
    }

    fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_events.subscribe()
    }
}

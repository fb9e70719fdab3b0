use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use shared::{
    domain::Collection,
    error::{ApiException, ErrorCode},
    protocol::{AuthSession, AuthUser, JsonObject, ListQuery, SessionEvent},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::RemoteGateway;
use crate::error::ClientError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Talks to a PostgREST data API (`/rest/v1`) and a GoTrue auth API
/// (`/auth/v1`) hosted under one base URL.
pub struct RestGateway {
    http: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<AuthSession>>,
    session_events: broadcast::Sender<SessionEvent>,
}

impl RestGateway {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, anon_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|err| ClientError::Config(format!("invalid backend url '{base_url}': {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "backend url must start with http:// or https://, got '{base_url}'"
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;
        let (session_events, _) = broadcast::channel(16);
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session: RwLock::new(None),
            session_events,
        })
    }

    /// Reinstates a session persisted by an earlier run. Does not emit a
    /// session event; the session store picks it up on `init`.
    pub async fn restore_session(&self, session: AuthSession) {
        *self.session.write().await = Some(session);
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    fn rest_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table_name())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiException> {
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(|err| ApiException::transport(err.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> ApiException {
    let status = response.status();
    let code = ErrorCode::from_http_status(status.as_u16());
    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&raw)
        .ok()
        .and_then(|body| {
            body.message
                .or(body.msg)
                .or(body.error_description)
                .or(body.error)
        })
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            if raw.is_empty() {
                format!("backend responded with {status}")
            } else {
                raw
            }
        });
    ApiException::new(code, message)
}

fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.select_columns().to_string())];
    for (column, value) in &query.filters {
        params.push((column.clone(), format!("eq.{value}")));
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl RemoteGateway for RestGateway {
    async fn list_records(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<Vec<JsonObject>, ApiException> {
        let response = self
            .send(self.http.get(self.rest_url(collection)).query(&list_params(query)))
            .await?;
        let rows: Vec<JsonObject> = response
            .json()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Internal, err.to_string()))?;
        debug!(collection = %collection, rows = rows.len(), "rest: listed records");
        Ok(rows)
    }

    async fn insert_record(
        &self,
        collection: Collection,
        fields: JsonObject,
    ) -> Result<JsonObject, ApiException> {
        let response = self
            .send(
                self.http
                    .post(self.rest_url(collection))
                    .header("Prefer", "return=representation")
                    .json(&fields),
            )
            .await?;
        let mut rows: Vec<JsonObject> = response
            .json()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Internal, err.to_string()))?;
        if rows.is_empty() {
            return Err(ApiException::new(
                ErrorCode::Internal,
                format!("insert into {collection} returned no row"),
            ));
        }
        info!(collection = %collection, "rest: record inserted");
        Ok(rows.swap_remove(0))
    }

    async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        fields: JsonObject,
    ) -> Result<(), ApiException> {
        self.send(
            self.http
                .patch(self.rest_url(collection))
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=minimal")
                .json(&fields),
        )
        .await?;
        debug!(collection = %collection, id, "rest: record updated");
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ApiException> {
        let response = self
            .send(
                self.http
                    .post(self.auth_url("token"))
                    .query(&[("grant_type", "password")])
                    .json(&PasswordGrant { email, password }),
            )
            .await
            .map_err(|mut err| {
                // GoTrue rejects bad credentials with 400 invalid_grant.
                if err.code == ErrorCode::Validation {
                    err.code = ErrorCode::Unauthorized;
                }
                err
            })?;
        let session: AuthSession = response
            .json()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Internal, err.to_string()))?;
        *self.session.write().await = Some(session.clone());
        info!(user_id = %session.user.id, "auth: signed in");
        let _ = self
            .session_events
            .send(SessionEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ApiException> {
        let had_session = self.session.read().await.is_some();
        let result = if had_session {
            self.send(self.http.post(self.auth_url("logout")))
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        self.session.write().await.take();
        if let Err(err) = &result {
            warn!(%err, "auth: backend sign-out failed; local session dropped anyway");
        }
        let _ = self.session_events.send(SessionEvent::SignedOut);
        result
    }

    async fn current_user(&self) -> Result<Option<AuthUser>, ApiException> {
        if self.session.read().await.is_none() {
            return Ok(None);
        }
        let response = self.send(self.http.get(self.auth_url("user"))).await?;
        let user: AuthUser = response
            .json()
            .await
            .map_err(|err| ApiException::new(ErrorCode::Internal, err.to_string()))?;
        Ok(Some(user))
    }

    fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_events.subscribe()
    }
}

#[cfg(test)]
#[path = "../tests/rest_gateway_tests.rs"]
mod tests;

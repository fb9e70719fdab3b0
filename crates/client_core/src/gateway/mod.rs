//! The hosted backend's data and auth surface.

use async_trait::async_trait;
use serde::Serialize;
use shared::{
    domain::{Collection, Record},
    error::ApiException,
    protocol::{AuthSession, AuthUser, JsonObject, ListQuery, SessionEvent},
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::ClientError;

mod memory;
mod rest;

pub use memory::MemoryGateway;
pub use rest::RestGateway;

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn list_records(
        &self,
        collection: Collection,
        query: &ListQuery,
    ) -> Result<Vec<JsonObject>, ApiException>;

    async fn insert_record(
        &self,
        collection: Collection,
        fields: JsonObject,
    ) -> Result<JsonObject, ApiException>;

    async fn update_record(
        &self,
        collection: Collection,
        id: &str,
        fields: JsonObject,
    ) -> Result<(), ApiException>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ApiException>;

    /// Always ends with no local session, even when the backend call fails.
    async fn sign_out(&self) -> Result<(), ApiException>;

    /// `Ok(None)` when there is no session at all.
    async fn current_user(&self) -> Result<Option<AuthUser>, ApiException>;

    fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent>;
}

pub async fn fetch_records<R: Record>(
    gateway: &dyn RemoteGateway,
    query: &ListQuery,
) -> Result<Vec<R>, ClientError> {
    let rows = gateway.list_records(R::COLLECTION, query).await?;
    let total = rows.len();
    let records: Vec<R> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or_default();
            match serde_json::from_value(serde_json::Value::Object(row)) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(collection = %R::COLLECTION, %id, %err, "gateway: skipping undecodable row");
                    None
                }
            }
        })
        .collect();
    if records.len() < total {
        debug!(
            collection = %R::COLLECTION,
            kept = records.len(),
            total,
            "gateway: partial listing"
        );
    }
    Ok(records)
}

pub async fn insert_typed<R: Record, T: Serialize + Sync>(
    gateway: &dyn RemoteGateway,
    new_record: &T,
) -> Result<R, ClientError> {
    let fields = to_object(new_record)?;
    let row = gateway.insert_record(R::COLLECTION, fields).await?;
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

pub fn to_object<T: Serialize>(value: &T) -> Result<JsonObject, ClientError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ClientError::validation(format!(
            "expected a json object for record fields, got {other}"
        ))),
    }
}

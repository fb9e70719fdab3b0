//! Optimistic field updates with reconciliation by re-fetch.
//!
//! A [`CollectionController`] owns the local copy of one collection. A
//! mutation is applied to that copy before the remote update is sent; if
//! the update fails the change is dropped and the collection is fetched
//! again from the backend.
//!
//! Mutations and fetches draw tickets from a single per-collection
//! sequence. A fetch result is applied only when no newer fetch has been
//! applied already, and on application every change that the fetched
//! snapshot cannot contain (still in flight, or committed after the fetch
//! was dispatched) is replayed over it.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use serde::Serialize;
use shared::{
    domain::{merge_fields, FieldChange, Record},
    error::ApiException,
    protocol::ListQuery,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, Notice},
    gateway::{fetch_records, insert_typed, RemoteGateway},
    ClientEvent,
};

/// Returns `records` with `change` applied to the record whose id matches.
/// Order and every other record are preserved; an unknown id leaves the
/// sequence as it was.
pub fn apply_local<R: Record>(records: &[R], id: R::Id, change: &R::Change) -> Vec<R> {
    records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            if record.id() == id {
                record.apply(change);
            }
            record
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPlacement {
    Prepend,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer fetch had already replaced the collection.
    Stale,
}

#[derive(Debug)]
pub enum MutationOutcome {
    Committed,
    RolledBack {
        error: ApiException,
        reloaded: bool,
    },
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed)
    }
}

struct JournalEntry<R: Record> {
    id: R::Id,
    change: R::Change,
    committed_at: Option<u64>,
}

struct CollectionState<R: Record> {
    records: Vec<R>,
    loaded: bool,
    last_error: Option<String>,
    seq: u64,
    journal: BTreeMap<u64, JournalEntry<R>>,
    inflight_fetches: BTreeSet<u64>,
    applied_fetch: u64,
}

impl<R: Record> CollectionState<R> {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            loaded: false,
            last_error: None,
            seq: 0,
            journal: BTreeMap::new(),
            inflight_fetches: BTreeSet::new(),
            applied_fetch: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn begin_mutation(&mut self, id: R::Id, change: R::Change) -> u64 {
        self.records = apply_local(&self.records, id, &change);
        let ticket = self.next_seq();
        self.journal.insert(
            ticket,
            JournalEntry {
                id,
                change,
                committed_at: None,
            },
        );
        ticket
    }

    fn commit(&mut self, ticket: u64) {
        let at = self.next_seq();
        if let Some(entry) = self.journal.get_mut(&ticket) {
            entry.committed_at = Some(at);
        }
        self.prune_committed();
    }

    fn discard(&mut self, ticket: u64) {
        self.journal.remove(&ticket);
    }

    fn begin_fetch(&mut self) -> u64 {
        let token = self.next_seq();
        self.inflight_fetches.insert(token);
        token
    }

    fn finish_fetch(&mut self, token: u64, result: Result<Vec<R>, String>) -> LoadOutcome {
        self.inflight_fetches.remove(&token);
        let outcome = if token < self.applied_fetch {
            LoadOutcome::Stale
        } else {
            self.applied_fetch = token;
            match result {
                Ok(mut records) => {
                    for entry in self.journal.values() {
                        let replay = entry.committed_at.map_or(true, |at| at > token);
                        if !replay {
                            continue;
                        }
                        for record in records.iter_mut().filter(|r| r.id() == entry.id) {
                            record.apply(&entry.change);
                        }
                    }
                    self.records = records;
                    self.loaded = true;
                    self.last_error = None;
                }
                Err(message) => {
                    self.records.clear();
                    self.last_error = Some(message);
                }
            }
            LoadOutcome::Applied
        };
        self.prune_committed();
        outcome
    }

    /// Committed changes only need to be kept while a fetch dispatched
    /// before their commit is still outstanding.
    fn prune_committed(&mut self) {
        let oldest_inflight = self.inflight_fetches.iter().next().copied();
        self.journal
            .retain(|_, entry| match (entry.committed_at, oldest_inflight) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(at), Some(oldest)) => at > oldest,
            });
    }
}

pub struct CollectionController<R: Record> {
    gateway: Arc<dyn RemoteGateway>,
    query: ListQuery,
    state: Mutex<CollectionState<R>>,
    events: broadcast::Sender<ClientEvent>,
}

impl<R: Record> CollectionController<R> {
    pub fn new(gateway: Arc<dyn RemoteGateway>, query: ListQuery) -> Self {
        let (events, _) = broadcast::channel(256);
        Self::with_events(gateway, query, events)
    }

    pub fn with_events(
        gateway: Arc<dyn RemoteGateway>,
        query: ListQuery,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            gateway,
            query,
            state: Mutex::new(CollectionState::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn records(&self) -> Vec<R> {
        self.state.lock().await.records.clone()
    }

    pub async fn find(&self, id: R::Id) -> Option<R> {
        self.state
            .lock()
            .await
            .records
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.loaded
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// Number of changes the controller still tracks.
    pub async fn pending_changes(&self) -> usize {
        self.state.lock().await.journal.len()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(ClientEvent::Notice(notice));
    }

    /// Fetches the authoritative sequence and replaces local state with it.
    /// A failed fetch empties the local sequence and records the error.
    pub async fn reload(&self) -> Result<LoadOutcome, ClientError> {
        let token = self.state.lock().await.begin_fetch();
        let fetched = fetch_records::<R>(&*self.gateway, &self.query).await;

        let (outcome, len, error) = {
            let mut state = self.state.lock().await;
            match fetched {
                Ok(records) => {
                    let outcome = state.finish_fetch(token, Ok(records));
                    (outcome, state.records.len(), None)
                }
                Err(err) => {
                    let outcome = state.finish_fetch(token, Err(err.to_string()));
                    (outcome, 0, Some(err))
                }
            }
        };

        if outcome == LoadOutcome::Stale {
            debug!(
                collection = %R::COLLECTION,
                token,
                "optimistic: discarded superseded fetch response"
            );
        }

        match error {
            Some(err) => {
                warn!(collection = %R::COLLECTION, %err, "optimistic: fetch failed");
                if outcome == LoadOutcome::Applied {
                    self.notify(Notice::from_error(
                        &format!("could not load {}", R::COLLECTION),
                        &err,
                    ));
                }
                Err(err)
            }
            None => {
                if outcome == LoadOutcome::Applied {
                    let _ = self.events.send(ClientEvent::CollectionReplaced {
                        collection: R::COLLECTION,
                        len,
                    });
                }
                Ok(outcome)
            }
        }
    }

    /// Applies `change` locally, then sends it to the backend once. On
    /// failure a notice is raised, the change is dropped and the
    /// collection is re-fetched.
    pub async fn mutate(
        &self,
        id: R::Id,
        change: R::Change,
    ) -> Result<MutationOutcome, ClientError> {
        let fields = change.to_fields()?;
        let field = change.field();
        let ticket = self.state.lock().await.begin_mutation(id, change);

        match self
            .gateway
            .update_record(R::COLLECTION, &id.to_string(), fields)
            .await
        {
            Ok(()) => {
                self.state.lock().await.commit(ticket);
                debug!(collection = %R::COLLECTION, %id, field, ticket, "optimistic: committed");
                Ok(MutationOutcome::Committed)
            }
            Err(error) => {
                warn!(
                    collection = %R::COLLECTION,
                    %id,
                    field,
                    %error,
                    "optimistic: remote update failed; reconciling"
                );
                self.state.lock().await.discard(ticket);
                self.notify(Notice::from_error(
                    &format!("could not change {field}; reverting"),
                    &ClientError::Gateway(error.clone()),
                ));
                let reloaded = self.reload().await.is_ok();
                Ok(MutationOutcome::RolledBack { error, reloaded })
            }
        }
    }

    pub async fn insert<T: Serialize + Sync>(
        &self,
        new_record: &T,
        placement: InsertPlacement,
    ) -> Result<R, ClientError> {
        let record = match insert_typed::<R, T>(&*self.gateway, new_record).await {
            Ok(record) => record,
            Err(err) => {
                warn!(collection = %R::COLLECTION, %err, "optimistic: insert failed");
                self.notify(Notice::from_error(
                    &format!("could not create {} record", R::COLLECTION),
                    &err,
                ));
                return Err(err);
            }
        };
        info!(collection = %R::COLLECTION, id = %record.id(), "optimistic: record created");

        match placement {
            InsertPlacement::Prepend => {
                self.state.lock().await.records.insert(0, record.clone());
            }
            InsertPlacement::Reload => {
                if let Err(err) = self.reload().await {
                    warn!(collection = %R::COLLECTION, %err, "optimistic: reload after insert failed");
                }
            }
        }
        Ok(record)
    }

    /// Multi-field edit that waits for the backend before touching local
    /// state, then reloads.
    pub async fn update_and_reload(
        &self,
        id: R::Id,
        changes: &[R::Change],
    ) -> Result<LoadOutcome, ClientError> {
        let fields = merge_fields(changes)?;
        if let Err(error) = self
            .gateway
            .update_record(R::COLLECTION, &id.to_string(), fields)
            .await
        {
            let err = ClientError::Gateway(error);
            warn!(collection = %R::COLLECTION, %id, %err, "optimistic: edit failed");
            self.notify(Notice::from_error(
                &format!("could not edit {} record", R::COLLECTION),
                &err,
            ));
            return Err(err);
        }
        self.reload().await
    }
}

#[cfg(test)]
#[path = "tests/optimistic_tests.rs"]
mod tests;

//! Process-wide session and profile state.
//!
//! [`SessionStore`] is created once, handed to pages as an `Arc`, and has
//! an explicit lifecycle: [`SessionStore::init`] subscribes to the
//! gateway's session changes and bootstraps from the current session,
//! [`SessionStore::teardown`] stops listening.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Profile, Role, UserAccount},
    protocol::{AuthUser, ListQuery, SessionEvent},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{error::ClientError, gateway::fetch_records, gateway::RemoteGateway};

/// What to do when a signed-in user has no readable profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileFallback {
    /// Synthesize a customer profile, which the guard refuses.
    #[default]
    Restricted,
    /// Synthesize an administrator profile.
    Administrator,
}

impl ProfileFallback {
    pub fn role(&self) -> Role {
        match self {
            ProfileFallback::Restricted => Role::Customer,
            ProfileFallback::Administrator => Role::Admin,
        }
    }

    pub fn synthesize(&self, user: &AuthUser) -> Profile {
        Profile {
            id: user.id.to_string(),
            name: user.email.clone().unwrap_or_else(|| "User".to_string()),
            role: self.role(),
        }
    }
}

impl FromStr for ProfileFallback {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restricted" | "customer" => Ok(ProfileFallback::Restricted),
            "administrator" | "admin" => Ok(ProfileFallback::Administrator),
            other => Err(ClientError::Config(format!(
                "unknown profile fallback '{other}', expected 'restricted' or 'administrator'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub current_user: Option<AuthUser>,
    pub current_profile: Option<Profile>,
    pub is_loading: bool,
}

impl SessionSnapshot {
    fn loading() -> Self {
        Self {
            current_user: None,
            current_profile: None,
            is_loading: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            current_user: None,
            current_profile: None,
            is_loading: false,
        }
    }
}

pub struct SessionStore {
    gateway: Arc<dyn RemoteGateway>,
    fallback: ProfileFallback,
    state: watch::Sender<SessionSnapshot>,
    /// Bumped by every `init`, `establish` and `clear`; a slower call only
    /// publishes while its generation is still the latest.
    generation: AtomicU64,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn RemoteGateway>, fallback: ProfileFallback) -> Arc<Self> {
        let (state, _) = watch::channel(SessionSnapshot::loading());
        Arc::new(Self {
            gateway,
            fallback,
            state,
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
        })
    }

    pub fn fallback(&self) -> ProfileFallback {
        self.fallback
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Starts listening for session changes, then resolves the current
    /// session. Calling it again restarts the listener.
    pub async fn init(self: &Arc<Self>) {
        let events = self.gateway.subscribe_session();
        let handle = tokio::spawn(listen(Arc::downgrade(self), events));
        if let Some(previous) = self.listener.lock().await.replace(handle) {
            previous.abort();
        }

        let generation = self.begin();
        self.state.send_replace(SessionSnapshot::loading());
        match self.gateway.current_user().await {
            Ok(Some(user)) => {
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.establish(user).await;
                } else {
                    debug!("session: bootstrap superseded");
                }
            }
            Ok(None) => {
                if self.publish(generation, SessionSnapshot::signed_out()) {
                    debug!("session: no active session");
                }
            }
            Err(err) => {
                warn!(%err, "session: could not read current session");
                self.publish(generation, SessionSnapshot::signed_out());
            }
        }
    }

    /// Records `user` as signed in and loads their profile.
    /// A `clear` or newer `establish` landing during the profile lookup
    /// wins; the lookup result is then dropped.
    pub async fn establish(&self, user: AuthUser) {
        let generation = self.begin();
        self.state.send_replace(SessionSnapshot {
            current_user: Some(user.clone()),
            current_profile: None,
            is_loading: true,
        });
        let profile = self.lookup_profile(&user).await;
        let role = profile.role;
        let published = self.publish(
            generation,
            SessionSnapshot {
                current_user: Some(user.clone()),
                current_profile: Some(profile),
                is_loading: false,
            },
        );
        if published {
            info!(user_id = %user.id, %role, "session: profile ready");
        } else {
            debug!(user_id = %user.id, "session: discarding superseded profile lookup");
        }
    }

    pub fn clear(&self) {
        self.begin();
        self.state.send_replace(SessionSnapshot::signed_out());
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The generation check runs under the channel's lock, so a concurrent
    /// `clear` either lands after this publish or makes it a no-op.
    fn publish(&self, generation: u64, snapshot: SessionSnapshot) -> bool {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = snapshot;
            true
        })
    }

    pub async fn teardown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
            debug!("session: listener stopped");
        }
    }

    async fn lookup_profile(&self, user: &AuthUser) -> Profile {
        let query = ListQuery::new()
            .select("*")
            .eq("auth_user_id", user.id)
            .limit(1);
        match fetch_records::<UserAccount>(&*self.gateway, &query).await {
            Ok(accounts) => match accounts.first() {
                Some(account) => Profile::from(account),
                None => {
                    warn!(user_id = %user.id, fallback = ?self.fallback, "session: no profile row; using fallback");
                    self.fallback.synthesize(user)
                }
            },
            Err(err) => {
                warn!(user_id = %user.id, %err, fallback = ?self.fallback, "session: profile lookup failed; using fallback");
                self.fallback.synthesize(user)
            }
        }
    }
}

async fn listen(store: Weak<SessionStore>, mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session: listener lagged behind session events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(store) = store.upgrade() else {
            break;
        };
        match event {
            SessionEvent::SignedIn(user) => {
                // A login through the client establishes the user itself.
                if store.snapshot().current_user.as_ref() == Some(&user) {
                    continue;
                }
                // The event may predate a sign-out that is already done.
                match store.gateway.current_user().await {
                    Ok(Some(current)) if current.id == user.id => store.establish(user).await,
                    Ok(_) => debug!(user_id = %user.id, "session: ignoring outdated sign-in event"),
                    Err(err) => warn!(%err, "session: could not confirm sign-in event"),
                }
            }
            SessionEvent::SignedOut => {
                store.clear();
                info!("session: signed out");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

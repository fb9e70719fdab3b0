//! Client core for the pizza-shop staff dashboard.
//!
//! [`AdminClient`] ties a [`RemoteGateway`] to the process-wide
//! [`SessionStore`] and hands out the per-collection pages. Every page
//! shares one event channel on which failures are reported as
//! [`Notice`]s.

use std::sync::Arc;

use shared::{
    domain::{Collection, Profile},
    protocol::AuthSession,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod error;
pub mod gateway;
pub mod guard;
pub mod optimistic;
pub mod pages;
pub mod pagination;
pub mod session;
pub mod theme;

pub use error::{ClientError, Notice, NoticeCategory};
pub use gateway::{MemoryGateway, RemoteGateway, RestGateway};
pub use guard::GuardDecision;
pub use optimistic::{apply_local, CollectionController, InsertPlacement, LoadOutcome, MutationOutcome};
pub use pagination::{paginate, Page, PageCursor};
pub use session::{ProfileFallback, SessionSnapshot, SessionStore};
pub use theme::{Theme, ThemeStore};

use pages::{DashboardPage, IngredientsPage, OrdersPage, PizzasPage, UsersPage};

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Notice(Notice),
    CollectionReplaced { collection: Collection, len: usize },
}

pub struct AdminClient {
    gateway: Arc<dyn RemoteGateway>,
    session: Arc<SessionStore>,
    events: broadcast::Sender<ClientEvent>,
}

impl AdminClient {
    pub fn new(gateway: Arc<dyn RemoteGateway>, fallback: ProfileFallback) -> Self {
        let session = SessionStore::new(Arc::clone(&gateway), fallback);
        let (events, _) = broadcast::channel(256);
        Self {
            gateway,
            session,
            events,
        }
    }

    pub fn gateway(&self) -> Arc<dyn RemoteGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Bootstraps the session from whatever the gateway already holds.
    pub async fn start(&self) {
        self.session.init().await;
    }

    pub async fn shutdown(&self) {
        self.session.teardown().await;
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(ClientEvent::Notice(notice));
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::validation("email and password are required"));
        }
        let session = match self.gateway.sign_in(email, password).await {
            Ok(session) => session,
            Err(err) => {
                let err = ClientError::from(err);
                warn!(%err, "auth: sign-in rejected");
                self.notify(Notice::from_error("sign-in failed", &err));
                return Err(err);
            }
        };
        self.session.establish(session.user.clone()).await;
        info!(user_id = %session.user.id, "auth: login complete");
        Ok(session)
    }

    /// Always ends signed out locally; a backend failure is only logged.
    pub async fn logout(&self) {
        if let Err(err) = self.gateway.sign_out().await {
            warn!(%err, "auth: sign-out failed on the backend");
        }
        self.session.clear();
    }

    pub fn profile(&self) -> Option<Profile> {
        self.session.snapshot().current_profile
    }

    pub fn guard(&self) -> GuardDecision {
        guard::evaluate_snapshot(&self.session.snapshot())
    }

    pub fn orders_page(&self) -> OrdersPage {
        OrdersPage::new(self.gateway(), self.events.clone())
    }

    pub fn users_page(&self) -> UsersPage {
        UsersPage::new(self.gateway(), self.events.clone())
    }

    pub fn pizzas_page(&self) -> PizzasPage {
        PizzasPage::new(self.gateway(), self.events.clone())
    }

    pub fn ingredients_page(&self) -> IngredientsPage {
        IngredientsPage::new(self.gateway(), self.events.clone())
    }

    pub fn dashboard(&self) -> DashboardPage {
        DashboardPage::new(self.gateway(), self.events.clone())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use std::sync::Arc;

use shared::{
    domain::{Record, Role, UserAccount, UserAccountId, UserChange},
    protocol::ListQuery,
};
use tokio::sync::broadcast;

use super::{ListFilter, Listing};
use crate::{
    error::ClientError,
    gateway::RemoteGateway,
    optimistic::{CollectionController, LoadOutcome, MutationOutcome},
    pagination::Page,
    ClientEvent,
};

/// Case-insensitive substring match on name or email. Surrounding
/// whitespace is ignored and an empty search matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSearch(String);

impl UserSearch {
    pub fn new(text: &str) -> Self {
        Self(text.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ListFilter<UserAccount> for UserSearch {
    fn matches(&self, user: &UserAccount) -> bool {
        if self.0.is_empty() {
            return true;
        }
        let contains = |value: &Option<String>| {
            value
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(&self.0))
        };
        contains(&user.name) || contains(&user.email)
    }
}

pub struct UsersPage {
    listing: Listing<UserAccount, UserSearch>,
}

impl UsersPage {
    pub const PAGE_SIZE: usize = 10;

    pub fn new(gateway: Arc<dyn RemoteGateway>, events: broadcast::Sender<ClientEvent>) -> Self {
        let controller = CollectionController::with_events(gateway, Self::query(), events);
        Self {
            listing: Listing::new(controller, Self::PAGE_SIZE, UserSearch::default()),
        }
    }

    /// Oldest accounts first.
    pub fn query() -> ListQuery {
        ListQuery::new().select("*").order_by("created_at", true)
    }

    pub fn controller(&self) -> &CollectionController<UserAccount> {
        self.listing.controller()
    }

    pub async fn load(&self) -> Result<LoadOutcome, ClientError> {
        self.listing.controller().reload().await
    }

    pub async fn users(&self) -> Vec<UserAccount> {
        self.listing.controller().records().await
    }

    pub async fn search(&self, text: &str) {
        self.listing.set_filter(UserSearch::new(text)).await;
    }

    pub async fn goto(&self, page: usize) {
        self.listing.goto(page).await;
    }

    pub async fn next_page(&self) {
        self.listing.next().await;
    }

    pub async fn previous_page(&self) {
        self.listing.previous().await;
    }

    pub async fn current_page(&self) -> Page<UserAccount> {
        self.listing.current_page().await
    }

    pub async fn show(&self, search: &str, page: usize) -> Page<UserAccount> {
        self.listing.show(UserSearch::new(search), page).await
    }

    async fn require(&self, id: UserAccountId) -> Result<UserAccount, ClientError> {
        self.listing
            .controller()
            .find(id)
            .await
            .ok_or_else(|| ClientError::UnknownRecord {
                collection: UserAccount::COLLECTION.to_string(),
                id: id.to_string(),
            })
    }

    /// Flips the account's active flag as currently shown.
    pub async fn toggle_active(&self, id: UserAccountId) -> Result<MutationOutcome, ClientError> {
        let user = self.require(id).await?;
        self.listing
            .controller()
            .mutate(id, UserChange::Active(!user.active))
            .await
    }

    pub async fn change_role(
        &self,
        id: UserAccountId,
        role: Role,
    ) -> Result<MutationOutcome, ClientError> {
        self.require(id).await?;
        self.listing
            .controller()
            .mutate(id, UserChange::Role(role))
            .await
    }
}

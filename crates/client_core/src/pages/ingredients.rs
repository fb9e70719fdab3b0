use std::sync::Arc;

use shared::{
    domain::{Ingredient, IngredientChange, IngredientId},
    protocol::{ListQuery, NewIngredient},
};
use tokio::sync::broadcast;

use super::Listing;
use crate::{
    error::ClientError,
    gateway::RemoteGateway,
    optimistic::{CollectionController, InsertPlacement, LoadOutcome},
    pagination::Page,
    ClientEvent,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientDraft {
    pub name: String,
    pub category: String,
    pub extra_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientEdit {
    pub name: String,
    pub category: String,
    pub extra_price: f64,
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn extra_price(price: f64) -> Result<f64, ClientError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ClientError::validation(
            "extra price must be a non-negative number",
        ));
    }
    Ok(price)
}

pub struct IngredientsPage {
    listing: Listing<Ingredient, ()>,
}

impl IngredientsPage {
    pub const PAGE_SIZE: usize = 10;

    pub fn new(gateway: Arc<dyn RemoteGateway>, events: broadcast::Sender<ClientEvent>) -> Self {
        let controller = CollectionController::with_events(gateway, Self::query(), events);
        Self {
            listing: Listing::new(controller, Self::PAGE_SIZE, ()),
        }
    }

    pub fn query() -> ListQuery {
        ListQuery::new().select("*").order_by("nombre", true)
    }

    pub fn controller(&self) -> &CollectionController<Ingredient> {
        self.listing.controller()
    }

    pub async fn load(&self) -> Result<LoadOutcome, ClientError> {
        self.listing.controller().reload().await
    }

    pub async fn ingredients(&self) -> Vec<Ingredient> {
        self.listing.controller().records().await
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

    pub async fn current_page(&self) -> Page<Ingredient> {
        self.listing.current_page().await
    }

    pub async fn show(&self, page: usize) -> Page<Ingredient> {
        self.listing.show((), page).await
    }

    pub async fn create(&self, draft: IngredientDraft) -> Result<Ingredient, ClientError> {
        let name = trimmed(&draft.name)
            .ok_or_else(|| ClientError::validation("an ingredient name is required"))?;
        let new_ingredient = NewIngredient {
            name,
            category: trimmed(&draft.category),
            extra_price: extra_price(draft.extra_price.unwrap_or(0.0))?,
        };
        self.listing
            .controller()
            .insert(&new_ingredient, InsertPlacement::Reload)
            .await
    }

    pub async fn quick_edit(
        &self,
        id: IngredientId,
        edit: IngredientEdit,
    ) -> Result<LoadOutcome, ClientError> {
        let name = trimmed(&edit.name)
            .ok_or_else(|| ClientError::validation("an ingredient name is required"))?;
        let changes = [
            IngredientChange::Name(name),
            IngredientChange::Category(trimmed(&edit.category)),
            IngredientChange::ExtraPrice(extra_price(edit.extra_price)?),
        ];
        self.listing
            .controller()
            .update_and_reload(id, &changes)
            .await
    }
}

use std::sync::Arc;

use shared::{
    domain::{PizzaChange, PizzaId, PizzaSize, PizzaTemplate, Record},
    protocol::{ListQuery, NewPizza},
};
use tokio::sync::broadcast;

use crate::{
    error::ClientError,
    gateway::RemoteGateway,
    optimistic::{CollectionController, InsertPlacement, LoadOutcome, MutationOutcome},
    ClientEvent,
};

/// Form input for a new pizza template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PizzaDraft {
    pub name: String,
    pub description: String,
    pub size: PizzaSize,
    pub base_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PizzaEdit {
    pub name: String,
    pub description: String,
    pub size: PizzaSize,
    pub base_price: f64,
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn check_price(price: f64) -> Result<f64, ClientError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ClientError::validation("price must be a non-negative number"));
    }
    Ok(price)
}

pub struct PizzasPage {
    pizzas: CollectionController<PizzaTemplate>,
}

impl PizzasPage {
    pub fn new(gateway: Arc<dyn RemoteGateway>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            pizzas: CollectionController::with_events(gateway, Self::query(), events),
        }
    }

    pub fn query() -> ListQuery {
        ListQuery::new().select("*").order_by("nombre", true)
    }

    pub fn controller(&self) -> &CollectionController<PizzaTemplate> {
        &self.pizzas
    }

    pub async fn load(&self) -> Result<LoadOutcome, ClientError> {
        self.pizzas.reload().await
    }

    pub async fn pizzas(&self) -> Vec<PizzaTemplate> {
        self.pizzas.records().await
    }

    /// New templates are always created active.
    pub async fn create(&self, draft: PizzaDraft) -> Result<PizzaTemplate, ClientError> {
        let name = non_empty(&draft.name)
            .ok_or_else(|| ClientError::validation("a pizza name is required"))?;
        let new_pizza = NewPizza {
            name,
            description: non_empty(&draft.description),
            size: draft.size,
            base_price: check_price(draft.base_price.unwrap_or(0.0))?,
            active: true,
        };
        self.pizzas.insert(&new_pizza, InsertPlacement::Reload).await
    }

    pub async fn toggle_active(&self, id: PizzaId) -> Result<MutationOutcome, ClientError> {
        let pizza = self
            .pizzas
            .find(id)
            .await
            .ok_or_else(|| ClientError::UnknownRecord {
                collection: PizzaTemplate::COLLECTION.to_string(),
                id: id.to_string(),
            })?;
        self.pizzas.mutate(id, PizzaChange::Active(!pizza.active)).await
    }

    pub async fn quick_edit(&self, id: PizzaId, edit: PizzaEdit) -> Result<LoadOutcome, ClientError> {
        let name = non_empty(&edit.name)
            .ok_or_else(|| ClientError::validation("a pizza name is required"))?;
        let changes = [
            PizzaChange::Name(name),
            PizzaChange::Description(non_empty(&edit.description)),
            PizzaChange::Size(edit.size),
            PizzaChange::BasePrice(check_price(edit.base_price)?),
        ];
        self.pizzas.update_and_reload(id, &changes).await
    }
}

use std::{fmt, str::FromStr, sync::Arc};

use shared::{
    domain::{Order, OrderChange, OrderId, OrderStatus, UnknownVariant, UserAccountId},
    protocol::{ListQuery, NewOrder},
};
use tokio::sync::broadcast;

use super::{ListFilter, Listing};
use crate::{
    error::ClientError,
    gateway::RemoteGateway,
    optimistic::{CollectionController, InsertPlacement, LoadOutcome, MutationOutcome},
    pagination::Page,
    ClientEvent,
};

pub const ORDER_SELECT: &str = "id,estado,total,metodo_pago,direccion_entrega,created_at,\
usuarios_app:usuarios_app!pedidos_cliente_id_fkey(nombre)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(OrderStatus),
}

impl ListFilter<Order> for StatusFilter {
    fn matches(&self, order: &Order) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => order.status == *status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" | "TODOS" => Ok(StatusFilter::All),
            _ => s.parse().map(StatusFilter::Only),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("ALL"),
            StatusFilter::Only(status) => status.fmt(f),
        }
    }
}

pub struct OrdersPage {
    listing: Listing<Order, StatusFilter>,
}

impl OrdersPage {
    pub const PAGE_SIZE: usize = 9;

    pub fn new(gateway: Arc<dyn RemoteGateway>, events: broadcast::Sender<ClientEvent>) -> Self {
        let controller = CollectionController::with_events(gateway, Self::query(), events);
        Self {
            listing: Listing::new(controller, Self::PAGE_SIZE, StatusFilter::All),
        }
    }

    /// Newest first, with the customer's name embedded.
    pub fn query() -> ListQuery {
        ListQuery::new()
            .select(ORDER_SELECT)
            .order_by("created_at", false)
    }

    pub fn controller(&self) -> &CollectionController<Order> {
        self.listing.controller()
    }

    pub async fn load(&self) -> Result<LoadOutcome, ClientError> {
        self.listing.controller().reload().await
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.listing.controller().records().await
    }

    pub async fn filter(&self) -> StatusFilter {
        self.listing.filter().await
    }

    pub async fn set_filter(&self, filter: StatusFilter) {
        self.listing.set_filter(filter).await;
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

    pub async fn current_page(&self) -> Page<Order> {
        self.listing.current_page().await
    }

    pub async fn show(&self, filter: StatusFilter, page: usize) -> Page<Order> {
        self.listing.show(filter, page).await
    }

    pub async fn change_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<MutationOutcome, ClientError> {
        self.listing
            .controller()
            .mutate(id, OrderChange::Status(status))
            .await
    }

    /// Inserts `order` and puts the stored row at the top of the list.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, ClientError> {
        if order.delivery_address.trim().is_empty() {
            return Err(ClientError::validation("a delivery address is required"));
        }
        if order.total < 0.0 {
            return Err(ClientError::validation("an order total cannot be negative"));
        }
        self.listing
            .controller()
            .insert(&order, InsertPlacement::Prepend)
            .await
    }

    /// The canned cash order used to exercise the kitchen flow.
    pub fn sample_order(customer_id: UserAccountId) -> NewOrder {
        NewOrder {
            customer_id,
            status: OrderStatus::Pending,
            total: 25000.0,
            payment_method: "EFECTIVO".to_string(),
            delivery_address: "Cra 50 #20-15".to_string(),
            channel: "APP_MOBILE".to_string(),
        }
    }
}

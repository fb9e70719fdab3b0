use std::sync::Arc;

use shared::{
    domain::{Collection, Order, OrderStatus},
    protocol::ListQuery,
};
use tokio::sync::broadcast;
use tracing::warn;

use super::orders::ORDER_SELECT;
use crate::{
    error::{ClientError, Notice},
    gateway::{fetch_records, RemoteGateway},
    ClientEvent,
};

/// How many recent orders the overview is computed over.
pub const KITCHEN_WINDOW: u32 = 20;
/// How many of those are listed individually.
pub const RECENT_PREVIEW: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_orders: usize,
    pub revenue: f64,
    pub pending: usize,
    pub baking: usize,
    pub out_for_delivery: usize,
    pub user_count: usize,
    pub recent: Vec<Order>,
    /// Share of the window still being worked on, 0 to 100.
    pub kitchen_load_percent: f64,
}

impl DashboardSummary {
    pub fn compute(orders: &[Order], user_count: usize) -> Self {
        let count = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();
        let pending = count(OrderStatus::Pending);
        let baking = count(OrderStatus::Baking);
        let out_for_delivery = count(OrderStatus::OutForDelivery);
        let total_orders = orders.len();
        let kitchen_load_percent = if total_orders == 0 {
            0.0
        } else {
            ((pending + baking + out_for_delivery) as f64 / total_orders as f64 * 100.0).min(100.0)
        };
        Self {
            total_orders,
            revenue: orders.iter().map(|o| o.total).sum(),
            pending,
            baking,
            out_for_delivery,
            user_count,
            recent: orders.iter().take(RECENT_PREVIEW).cloned().collect(),
            kitchen_load_percent,
        }
    }
}

pub struct DashboardPage {
    gateway: Arc<dyn RemoteGateway>,
    events: broadcast::Sender<ClientEvent>,
}

impl DashboardPage {
    pub fn new(gateway: Arc<dyn RemoteGateway>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self { gateway, events }
    }

    pub fn orders_query() -> ListQuery {
        ListQuery::new()
            .select(ORDER_SELECT)
            .order_by("created_at", false)
            .limit(KITCHEN_WINDOW)
    }

    /// Fetches recent orders and the account count concurrently; either
    /// failing fails the whole load.
    pub async fn load(&self) -> Result<DashboardSummary, ClientError> {
        let orders_query = Self::orders_query();
        let users_query = ListQuery::new().select("id");
        let result = futures::try_join!(
            fetch_records::<Order>(&*self.gateway, &orders_query),
            async {
                self.gateway
                    .list_records(Collection::Users, &users_query)
                    .await
                    .map(|rows| rows.len())
                    .map_err(ClientError::from)
            }
        );
        match result {
            Ok((orders, user_count)) => Ok(DashboardSummary::compute(&orders, user_count)),
            Err(err) => {
                warn!(%err, "dashboard: load failed");
                let _ = self
                    .events
                    .send(ClientEvent::Notice(Notice::from_error("could not load the dashboard", &err)));
                Err(err)
            }
        }
    }
}

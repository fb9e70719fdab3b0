//! Staff-facing views over the backend collections. Each page owns its
//! record sequence through a [`CollectionController`] and pages it on the
//! client.

use shared::domain::Record;
use tokio::sync::Mutex;

use crate::{
    optimistic::CollectionController,
    pagination::{Page, PageCursor},
};

mod dashboard;
mod ingredients;
mod orders;
mod pizzas;
mod users;

pub use dashboard::{DashboardPage, DashboardSummary, KITCHEN_WINDOW, RECENT_PREVIEW};
pub use ingredients::{IngredientDraft, IngredientEdit, IngredientsPage};
pub use orders::{OrdersPage, StatusFilter, ORDER_SELECT};
pub use pizzas::{PizzaDraft, PizzaEdit, PizzasPage};
pub use users::{UserSearch, UsersPage};

/// A predicate a listing can be filtered by. Changing it resets paging.
pub trait ListFilter<R>: Clone + PartialEq + Send + Sync {
    fn matches(&self, record: &R) -> bool;
}

/// No filtering.
impl<R> ListFilter<R> for () {
    fn matches(&self, _record: &R) -> bool {
        true
    }
}

pub(crate) struct Listing<R: Record, F> {
    controller: CollectionController<R>,
    filter: Mutex<F>,
    cursor: Mutex<PageCursor<F>>,
}

impl<R: Record, F: ListFilter<R>> Listing<R, F> {
    pub(crate) fn new(controller: CollectionController<R>, page_size: usize, filter: F) -> Self {
        Self {
            controller,
            filter: Mutex::new(filter),
            cursor: Mutex::new(PageCursor::new(page_size)),
        }
    }

    pub(crate) fn controller(&self) -> &CollectionController<R> {
        &self.controller
    }

    pub(crate) async fn filter(&self) -> F {
        self.filter.lock().await.clone()
    }

    pub(crate) async fn set_filter(&self, filter: F) {
        *self.filter.lock().await = filter;
    }

    pub(crate) async fn goto(&self, page: usize) {
        self.cursor.lock().await.goto(page);
    }

    pub(crate) async fn next(&self) {
        self.cursor.lock().await.next();
    }

    pub(crate) async fn previous(&self) {
        self.cursor.lock().await.previous();
    }

    pub(crate) async fn current_page(&self) -> Page<R> {
        let records = self.controller.records().await;
        let filter = self.filter().await;
        self.cursor
            .lock()
            .await
            .page(&records, &filter, |record| filter.matches(record))
    }

    /// Applies `filter` and jumps to `page` in one step.
    pub(crate) async fn show(&self, filter: F, page: usize) -> Page<R> {
        self.set_filter(filter).await;
        self.current_page().await;
        self.goto(page).await;
        self.current_page().await
    }
}

#[cfg(test)]
#[path = "../tests/pages_tests.rs"]
mod tests;

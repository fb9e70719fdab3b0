use serde::{Deserialize, Serialize};

use crate::domain::{AuthUserId, OrderStatus, PizzaSize, UserAccountId};

/// A record as it travels over the wire: column name to value.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Row selection for `list_records`. Filters are equality matches and are
/// combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default)]
    pub filters: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = Some(columns.into());
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((column.into(), value.to_string()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select_columns(&self) -> &str {
        self.select.as_deref().unwrap_or("*")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: AuthUserId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(AuthUser),
    SignedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrder {
    #[serde(rename = "cliente_id")]
    pub customer_id: UserAccountId,
    #[serde(rename = "estado")]
    pub status: OrderStatus,
    pub total: f64,
    #[serde(rename = "metodo_pago")]
    pub payment_method: String,
    #[serde(rename = "direccion_entrega")]
    pub delivery_address: String,
    #[serde(rename = "canal")]
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPizza {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "tamano")]
    pub size: PizzaSize,
    #[serde(rename = "precio_base")]
    pub base_price: f64,
    #[serde(rename = "activa")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIngredient {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    #[serde(rename = "precio_extra")]
    pub extra_price: f64,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;

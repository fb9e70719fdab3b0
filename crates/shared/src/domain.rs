use std::{fmt, hash::Hash, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::protocol::JsonObject;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// First eight hex digits, the form shown on order cards.
            pub fn short(&self) -> String {
                self.0.simple().to_string()[..8].to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

id_newtype!(OrderId);
id_newtype!(IngredientId);
id_newtype!(PizzaId);
id_newtype!(UserAccountId);
id_newtype!(AuthUserId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Declares a closed enumeration with an English display name and the
/// value the hosted schema stores for it.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => ($display:literal, $wire:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $display,)+
                }
            }

            pub fn wire_value(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
                $(
                    if normalized == $display || normalized == $wire {
                        return Ok($name::$variant);
                    }
                )+
                Err(UnknownVariant {
                    kind: $kind,
                    value: s.to_string(),
                })
            }
        }
    };
}

wire_enum! {
    /// Order lifecycle, in the order the kitchen moves through it.
    OrderStatus, "order status" {
        Pending => ("PENDING", "PENDIENTE"),
        Preparing => ("PREPARING", "PREPARANDO"),
        Baking => ("BAKING", "HORNEANDO"),
        Ready => ("READY", "LISTO"),
        OutForDelivery => ("OUT_FOR_DELIVERY", "EN_CAMINO"),
        Delivered => ("DELIVERED", "ENTREGADO"),
        Canceled => ("CANCELED", "CANCELADO"),
    }
}

wire_enum! {
    Role, "role" {
        Admin => ("ADMIN", "ADMIN"),
        Cashier => ("CASHIER", "CAJERO"),
        Kitchen => ("KITCHEN", "COCINA"),
        Delivery => ("DELIVERY", "REPARTIDOR"),
        Customer => ("CUSTOMER", "CLIENTE"),
    }
}

wire_enum! {
    PizzaSize, "pizza size" {
        Personal => ("PERSONAL", "PERSONAL"),
        Medium => ("MEDIUM", "MEDIANA"),
        Family => ("FAMILY", "FAMILIAR"),
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

impl Default for PizzaSize {
    fn default() -> Self {
        PizzaSize::Medium
    }
}

impl Role {
    /// Roles allowed into the admin surfaces.
    pub const STAFF: [Role; 3] = [Role::Admin, Role::Cashier, Role::Kitchen];

    pub fn is_staff(&self) -> bool {
        Self::STAFF.contains(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Orders,
    Ingredients,
    Pizzas,
    Users,
}

impl Collection {
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Orders => "pedidos",
            Collection::Ingredients => "ingredientes",
            Collection::Pizzas => "pizzas_base",
            Collection::Users => "usuarios_app",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A single-column change. Serializes as `{ "<column>": <value> }`, which
/// is exactly the body of a field-level update.
pub trait FieldChange: Clone + fmt::Debug + Serialize + Send + Sync + 'static {
    fn field(&self) -> &'static str;

    fn to_fields(&self) -> Result<JsonObject, serde_json::Error> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Ok(JsonObject::from_iter([(self.field().to_string(), other)])),
        }
    }
}

/// Merges several changes into one update body; later changes win.
pub fn merge_fields<C: FieldChange>(changes: &[C]) -> Result<JsonObject, serde_json::Error> {
    let mut fields = JsonObject::new();
    for change in changes {
        fields.extend(change.to_fields()?);
    }
    Ok(fields)
}

/// Nullable columns read as the type's default, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + Ord + fmt::Display + fmt::Debug + Send + Sync + 'static;
    type Change: FieldChange;

    const COLLECTION: Collection;

    fn id(&self) -> Self::Id;
    fn apply(&mut self, change: &Self::Change);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(rename = "estado")]
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: f64,
    #[serde(rename = "metodo_pago", default)]
    pub payment_method: Option<String>,
    #[serde(rename = "direccion_entrega", default)]
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "usuarios_app", default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerRef>,
}

impl Order {
    pub fn customer_name(&self) -> &str {
        self.customer
            .as_ref()
            .and_then(|customer| customer.name.as_deref())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OrderChange {
    #[serde(rename = "estado")]
    Status(OrderStatus),
}

impl FieldChange for OrderChange {
    fn field(&self) -> &'static str {
        match self {
            OrderChange::Status(_) => "estado",
        }
    }
}

impl Record for Order {
    type Id = OrderId;
    type Change = OrderChange;

    const COLLECTION: Collection = Collection::Orders;

    fn id(&self) -> OrderId {
        self.id
    }

    fn apply(&mut self, change: &OrderChange) {
        match change {
            OrderChange::Status(status) => self.status = *status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "precio_extra", default, deserialize_with = "null_as_default")]
    pub extra_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IngredientChange {
    #[serde(rename = "nombre")]
    Name(String),
    #[serde(rename = "categoria")]
    Category(Option<String>),
    #[serde(rename = "precio_extra")]
    ExtraPrice(f64),
}

impl FieldChange for IngredientChange {
    fn field(&self) -> &'static str {
        match self {
            IngredientChange::Name(_) => "nombre",
            IngredientChange::Category(_) => "categoria",
            IngredientChange::ExtraPrice(_) => "precio_extra",
        }
    }
}

impl Record for Ingredient {
    type Id = IngredientId;
    type Change = IngredientChange;

    const COLLECTION: Collection = Collection::Ingredients;

    fn id(&self) -> IngredientId {
        self.id
    }

    fn apply(&mut self, change: &IngredientChange) {
        match change {
            IngredientChange::Name(name) => self.name = name.clone(),
            IngredientChange::Category(category) => self.category = category.clone(),
            IngredientChange::ExtraPrice(price) => self.extra_price = *price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PizzaTemplate {
    pub id: PizzaId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "tamano", default)]
    pub size: Option<PizzaSize>,
    #[serde(rename = "precio_base", default, deserialize_with = "null_as_default")]
    pub base_price: f64,
    #[serde(rename = "activa", default, deserialize_with = "null_as_default")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PizzaChange {
    #[serde(rename = "nombre")]
    Name(String),
    #[serde(rename = "descripcion")]
    Description(Option<String>),
    #[serde(rename = "tamano")]
    Size(PizzaSize),
    #[serde(rename = "precio_base")]
    BasePrice(f64),
    #[serde(rename = "activa")]
    Active(bool),
}

impl FieldChange for PizzaChange {
    fn field(&self) -> &'static str {
        match self {
            PizzaChange::Name(_) => "nombre",
            PizzaChange::Description(_) => "descripcion",
            PizzaChange::Size(_) => "tamano",
            PizzaChange::BasePrice(_) => "precio_base",
            PizzaChange::Active(_) => "activa",
        }
    }
}

impl Record for PizzaTemplate {
    type Id = PizzaId;
    type Change = PizzaChange;

    const COLLECTION: Collection = Collection::Pizzas;

    fn id(&self) -> PizzaId {
        self.id
    }

    fn apply(&mut self, change: &PizzaChange) {
        match change {
            PizzaChange::Name(name) => self.name = name.clone(),
            PizzaChange::Description(description) => self.description = description.clone(),
            PizzaChange::Size(size) => self.size = Some(*size),
            PizzaChange::BasePrice(price) => self.base_price = *price,
            PizzaChange::Active(active) => self.active = *active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserAccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_user_id: Option<AuthUserId>,
    #[serde(rename = "nombre", default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "rol", default)]
    pub role: Option<Role>,
    #[serde(rename = "activo", default, deserialize_with = "null_as_default")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Accounts without a stored role are treated as customers.
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("No name")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UserChange {
    #[serde(rename = "activo")]
    Active(bool),
    #[serde(rename = "rol")]
    Role(Role),
}

impl FieldChange for UserChange {
    fn field(&self) -> &'static str {
        match self {
            UserChange::Active(_) => "activo",
            UserChange::Role(_) => "rol",
        }
    }
}

impl Record for UserAccount {
    type Id = UserAccountId;
    type Change = UserChange;

    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> UserAccountId {
        self.id
    }

    fn apply(&mut self, change: &UserChange) {
        match change {
            UserChange::Active(active) => self.active = *active,
            UserChange::Role(role) => self.role = Some(*role),
        }
    }
}

/// The signed-in staff member as seen by guards and pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl From<&UserAccount> for Profile {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.display_name().to_string(),
            role: account.effective_role(),
        }
    }
}

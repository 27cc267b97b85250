use chrono::{DateTime, Utc};
use common::{
    CartId, CartItemId, Money, OrderCode, OrderId, OrderItemId, OrderStatus, ProductId,
    SessionKey, StoreId,
};
use serde::{Deserialize, Serialize};

/// Row version used for optimistic concurrency control.
///
/// A row is inserted at version 1; every committed update increments it.
/// Updates carry the version the writer read, and the store rejects the
/// write if the row has moved on since.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a freshly inserted row.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A store (tenant) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: StoreId,
    pub name: String,
    /// Opaque reference to the owning user account.
    pub owner: String,
    pub description: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// A product row.
///
/// `units_sold` and `total_revenue` only ever grow, and only through order
/// fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub inventory: u32,
    pub units_sold: u64,
    pub total_revenue: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// A shopping cart row, unique per (session, store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    pub id: CartId,
    pub session_key: SessionKey,
    pub store_id: StoreId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// A cart line, unique per (cart, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Product price captured when the line was first added.
    pub price: Money,
    pub added_at: DateTime<Utc>,
    pub version: Version,
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub store_id: StoreId,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_location: String,
    pub order_code: OrderCode,
    pub total_amount: Money,
    pub final_total_amount: Option<Money>,
    pub status: OrderStatus,
    pub notes: String,
    pub placed_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

/// An order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Index of the line in the cart it was checked out from.
    pub position: u32,
    pub quantity: u32,
    /// Price snapshot taken from the cart line at checkout.
    pub price: Money,
    /// Settled price, `None` until renegotiated.
    pub final_price: Option<Money>,
    pub version: Version,
}

/// Access to the concurrency version of a record.
pub trait Versioned {
    fn version(&self) -> Version;
    fn set_version(&mut self, version: Version);
}

macro_rules! impl_versioned {
    ($($record:ty),* $(,)?) => {
        $(
            impl Versioned for $record {
                fn version(&self) -> Version {
                    self.version
                }

                fn set_version(&mut self, version: Version) {
                    self.version = version;
                }
            }
        )*
    };
}

impl_versioned!(
    StoreRecord,
    ProductRecord,
    CartRecord,
    CartItemRecord,
    OrderRecord,
    OrderItemRecord,
);

/// Any row the store can write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Store(StoreRecord),
    Product(ProductRecord),
    Cart(CartRecord),
    CartItem(CartItemRecord),
    Order(OrderRecord),
    OrderItem(OrderItemRecord),
}

impl Row {
    /// Returns the primary key of the row.
    pub fn key(&self) -> RowKey {
        match self {
            Row::Store(r) => RowKey::Store(r.id),
            Row::Product(r) => RowKey::Product(r.id),
            Row::Cart(r) => RowKey::Cart(r.id),
            Row::CartItem(r) => RowKey::CartItem(r.id),
            Row::Order(r) => RowKey::Order(r.id),
            Row::OrderItem(r) => RowKey::OrderItem(r.id),
        }
    }

    /// Returns the version carried by the row.
    pub fn version(&self) -> Version {
        match self {
            Row::Store(r) => r.version,
            Row::Product(r) => r.version,
            Row::Cart(r) => r.version,
            Row::CartItem(r) => r.version,
            Row::Order(r) => r.version,
            Row::OrderItem(r) => r.version,
        }
    }
}

macro_rules! impl_row_from {
    ($($variant:ident => $record:ty),* $(,)?) => {
        $(
            impl From<$record> for Row {
                fn from(record: $record) -> Self {
                    Row::$variant(record)
                }
            }
        )*
    };
}

impl_row_from!(
    Store => StoreRecord,
    Product => ProductRecord,
    Cart => CartRecord,
    CartItem => CartItemRecord,
    Order => OrderRecord,
    OrderItem => OrderItemRecord,
);

/// Primary key of a row, tagged with its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    Store(StoreId),
    Product(ProductId),
    Cart(CartId),
    CartItem(CartItemId),
    Order(OrderId),
    OrderItem(OrderItemId),
}

impl RowKey {
    /// Returns the entity name used in errors.
    pub fn entity(&self) -> &'static str {
        match self {
            RowKey::Store(_) => "store",
            RowKey::Product(_) => "product",
            RowKey::Cart(_) => "cart",
            RowKey::CartItem(_) => "cart item",
            RowKey::Order(_) => "order",
            RowKey::OrderItem(_) => "order item",
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowKey::Store(id) => write!(f, "{id}"),
            RowKey::Product(id) => write!(f, "{id}"),
            RowKey::Cart(id) => write!(f, "{id}"),
            RowKey::CartItem(id) => write!(f, "{id}"),
            RowKey::Order(id) => write!(f, "{id}"),
            RowKey::OrderItem(id) => write!(f, "{id}"),
        }
    }
}

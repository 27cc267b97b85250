use async_trait::async_trait;
use common::{CartId, OrderCode, OrderId, ProductId, SessionKey, StoreId};

use crate::{
    CartItemRecord, CartRecord, Change, ChangeSet, OrderItemRecord, OrderQuery, OrderRecord,
    ProductRecord, Result, StoreRecord,
};

/// Names of the unique constraints the store enforces.
///
/// Backends report violations with these names so callers can tell an
/// order-code collision apart from, say, a duplicate cart.
pub mod constraint {
    pub const ORDER_CODE: &str = "orders_order_code_key";
    pub const CART_SESSION_STORE: &str = "carts_session_store_key";
    pub const CART_ITEM_PRODUCT: &str = "cart_items_cart_product_key";
    pub const PRIMARY_KEY: &str = "primary_key";
}

/// Core trait for storefront persistence backends.
///
/// Reads return plain records; every write goes through [`commit`], which
/// applies a whole [`ChangeSet`] atomically with per-row version checks.
/// All implementations must be thread-safe (Send + Sync).
///
/// [`commit`]: StorefrontStore::commit
#[async_trait]
pub trait StorefrontStore: Send + Sync {
    /// Applies every change or none of them.
    ///
    /// Fails with `ConcurrencyConflict` when an update or guarded delete
    /// finds a different version than the one carried by the change, and
    /// with `UniqueViolation` when an insert collides with a unique key.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;

    async fn get_store(&self, id: StoreId) -> Result<Option<StoreRecord>>;

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Lists a store's products ordered by creation time.
    async fn list_products(&self, store_id: StoreId) -> Result<Vec<ProductRecord>>;

    async fn get_cart(&self, id: CartId) -> Result<Option<CartRecord>>;

    /// Looks up the cart of a session in a store.
    async fn find_cart(
        &self,
        session_key: &SessionKey,
        store_id: StoreId,
    ) -> Result<Option<CartRecord>>;

    /// Lists the lines of a cart in the order they were added.
    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>>;

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItemRecord>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    async fn find_order_by_code(&self, code: &OrderCode) -> Result<Option<OrderRecord>>;

    /// Lists orders matching a query, oldest first.
    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>>;

    /// Lists the lines of an order.
    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StorefrontStoreExt: StorefrontStore {
    /// Commits a single change.
    async fn commit_one(&self, change: Change) -> Result<()> {
        let mut changes = ChangeSet::new();
        changes.push(change);
        self.commit(changes).await
    }

    /// Checks whether an order code is already taken.
    async fn order_code_exists(&self, code: &OrderCode) -> Result<bool> {
        Ok(self.find_order_by_code(code).await?.is_some())
    }

    /// Counts the orders matching a query.
    async fn count_orders(&self, query: OrderQuery) -> Result<usize> {
        Ok(self.query_orders(query).await?.len())
    }
}

// Blanket implementation for all StorefrontStore implementations
impl<T: StorefrontStore + ?Sized> StorefrontStoreExt for T {}

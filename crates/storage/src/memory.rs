use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{
    CartId, CartItemId, OrderCode, OrderId, OrderItemId, ProductId, SessionKey, StoreId,
};
use tokio::sync::RwLock;

use crate::{
    CartItemRecord, CartRecord, Change, ChangeSet, OrderItemRecord, OrderQuery, OrderRecord,
    ProductRecord, Result, Row, RowKey, StorageError, StoreRecord, Version, Versioned,
    change::validate_changes,
    store::{StorefrontStore, constraint},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    stores: HashMap<StoreId, StoreRecord>,
    products: HashMap<ProductId, ProductRecord>,
    carts: HashMap<CartId, CartRecord>,
    cart_items: HashMap<CartItemId, CartItemRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    order_items: HashMap<OrderItemId, OrderItemRecord>,
}

/// In-memory store implementation for testing and single-process use.
///
/// Commits are applied to a copy of the tables which replaces the live
/// tables only when every change succeeded, so a failing change leaves no
/// trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorefrontStore {
    tables: Arc<RwLock<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryStorefrontStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail with [`StorageError::Unavailable`].
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of order lines stored.
    pub async fn order_item_count(&self) -> usize {
        self.tables.read().await.order_items.len()
    }

    /// Returns the number of cart lines stored across all carts.
    pub async fn cart_item_count(&self) -> usize {
        self.tables.read().await.cart_items.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

fn check_version(key: RowKey, current: Version, expected: Version) -> Result<()> {
    if current != expected {
        return Err(StorageError::ConcurrencyConflict {
            entity: key.entity(),
            id: key.to_string(),
            expected,
            actual: current,
        });
    }
    Ok(())
}

fn not_found(entity: &'static str, id: impl ToString) -> StorageError {
    StorageError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn insert_new<K: Eq + Hash + Copy, R>(
    table: &mut HashMap<K, R>,
    key: RowKey,
    id: K,
    row: R,
) -> Result<()> {
    if table.contains_key(&id) {
        return Err(StorageError::UniqueViolation {
            constraint: constraint::PRIMARY_KEY,
            value: format!("{} {}", key.entity(), key),
        });
    }
    table.insert(id, row);
    Ok(())
}

fn replace_versioned<K: Eq + Hash + Copy, R: Versioned>(
    table: &mut HashMap<K, R>,
    key: RowKey,
    id: K,
    mut row: R,
) -> Result<()> {
    let current = table
        .get(&id)
        .ok_or_else(|| not_found(key.entity(), key))?;
    check_version(key, current.version(), row.version())?;
    row.set_version(row.version().next());
    table.insert(id, row);
    Ok(())
}

fn remove_versioned<K: Eq + Hash + Copy, R: Versioned>(
    table: &mut HashMap<K, R>,
    key: RowKey,
    id: K,
    expected: Option<Version>,
) -> Result<()> {
    let current = table
        .get(&id)
        .ok_or_else(|| not_found(key.entity(), key))?;
    if let Some(expected) = expected {
        check_version(key, current.version(), expected)?;
    }
    table.remove(&id);
    Ok(())
}

impl Tables {
    fn apply(&mut self, change: Change) -> Result<()> {
        match change {
            Change::Insert(row) => self.insert(row),
            Change::Update(row) => self.update(row),
            Change::Delete { key, expected } => self.delete(key, expected),
        }
    }

    fn insert(&mut self, row: Row) -> Result<()> {
        let key = row.key();
        match row {
            Row::Store(r) => insert_new(&mut self.stores, key, r.id, r),
            Row::Product(r) => {
                if !self.stores.contains_key(&r.store_id) {
                    return Err(not_found("store", r.store_id));
                }
                insert_new(&mut self.products, key, r.id, r)
            }
            Row::Cart(r) => {
                if !self.stores.contains_key(&r.store_id) {
                    return Err(not_found("store", r.store_id));
                }
                if self
                    .carts
                    .values()
                    .any(|c| c.session_key == r.session_key && c.store_id == r.store_id)
                {
                    return Err(StorageError::UniqueViolation {
                        constraint: constraint::CART_SESSION_STORE,
                        value: format!("({}, {})", r.session_key, r.store_id),
                    });
                }
                insert_new(&mut self.carts, key, r.id, r)
            }
            Row::CartItem(r) => {
                if !self.carts.contains_key(&r.cart_id) {
                    return Err(not_found("cart", r.cart_id));
                }
                if !self.products.contains_key(&r.product_id) {
                    return Err(not_found("product", r.product_id));
                }
                if self
                    .cart_items
                    .values()
                    .any(|i| i.cart_id == r.cart_id && i.product_id == r.product_id)
                {
                    return Err(StorageError::UniqueViolation {
                        constraint: constraint::CART_ITEM_PRODUCT,
                        value: format!("({}, {})", r.cart_id, r.product_id),
                    });
                }
                insert_new(&mut self.cart_items, key, r.id, r)
            }
            Row::Order(r) => {
                if !self.stores.contains_key(&r.store_id) {
                    return Err(not_found("store", r.store_id));
                }
                self.check_order_code_free(&r.order_code, r.id)?;
                insert_new(&mut self.orders, key, r.id, r)
            }
            Row::OrderItem(r) => {
                if !self.orders.contains_key(&r.order_id) {
                    return Err(not_found("order", r.order_id));
                }
                if !self.products.contains_key(&r.product_id) {
                    return Err(not_found("product", r.product_id));
                }
                insert_new(&mut self.order_items, key, r.id, r)
            }
        }
    }

    fn update(&mut self, row: Row) -> Result<()> {
        let key = row.key();
        match row {
            Row::Store(r) => replace_versioned(&mut self.stores, key, r.id, r),
            Row::Product(r) => replace_versioned(&mut self.products, key, r.id, r),
            Row::Cart(r) => replace_versioned(&mut self.carts, key, r.id, r),
            Row::CartItem(r) => replace_versioned(&mut self.cart_items, key, r.id, r),
            Row::Order(r) => {
                self.check_order_code_free(&r.order_code, r.id)?;
                replace_versioned(&mut self.orders, key, r.id, r)
            }
            Row::OrderItem(r) => replace_versioned(&mut self.order_items, key, r.id, r),
        }
    }

    fn delete(&mut self, key: RowKey, expected: Option<Version>) -> Result<()> {
        match key {
            RowKey::Store(id) => {
                remove_versioned(&mut self.stores, key, id, expected)?;
                self.cascade_store(id);
                Ok(())
            }
            RowKey::Product(id) => {
                remove_versioned(&mut self.products, key, id, expected)?;
                self.cascade_product(id);
                Ok(())
            }
            RowKey::CartItem(id) => remove_versioned(&mut self.cart_items, key, id, expected),
            RowKey::Cart(_) | RowKey::Order(_) | RowKey::OrderItem(_) => Err(
                StorageError::InvalidChangeSet(format!("{} rows cannot be deleted", key.entity())),
            ),
        }
    }

    fn check_order_code_free(&self, code: &OrderCode, owner: OrderId) -> Result<()> {
        if self
            .orders
            .values()
            .any(|o| o.order_code == *code && o.id != owner)
        {
            return Err(StorageError::UniqueViolation {
                constraint: constraint::ORDER_CODE,
                value: code.to_string(),
            });
        }
        Ok(())
    }

    fn cascade_product(&mut self, product_id: ProductId) {
        self.cart_items.retain(|_, i| i.product_id != product_id);
        self.order_items.retain(|_, i| i.product_id != product_id);
    }

    fn cascade_store(&mut self, store_id: StoreId) {
        let products: Vec<ProductId> = self
            .products
            .values()
            .filter(|p| p.store_id == store_id)
            .map(|p| p.id)
            .collect();
        for product_id in products {
            self.products.remove(&product_id);
            self.cascade_product(product_id);
        }

        self.carts.retain(|_, c| c.store_id != store_id);
        let carts = &self.carts;
        self.cart_items.retain(|_, i| carts.contains_key(&i.cart_id));

        self.orders.retain(|_, o| o.store_id != store_id);
        let orders = &self.orders;
        self.order_items.retain(|_, i| orders.contains_key(&i.order_id));
    }
}

#[async_trait]
impl StorefrontStore for InMemoryStorefrontStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        validate_changes(&changes)?;

        let mut tables = self.tables.write().await;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        let mut staged = tables.clone();
        for change in changes {
            staged.apply(change)?;
        }
        *tables = staged;

        Ok(())
    }

    async fn get_store(&self, id: StoreId) -> Result<Option<StoreRecord>> {
        Ok(self.tables.read().await.stores.get(&id).cloned())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self, store_id: StoreId) -> Result<Vec<ProductRecord>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| p.store_id == store_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_cart(&self, id: CartId) -> Result<Option<CartRecord>> {
        Ok(self.tables.read().await.carts.get(&id).cloned())
    }

    async fn find_cart(
        &self,
        session_key: &SessionKey,
        store_id: StoreId,
    ) -> Result<Option<CartRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .carts
            .values()
            .find(|c| c.session_key == *session_key && c.store_id == store_id)
            .cloned())
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .cart_items
            .values()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn find_cart_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Option<CartItemRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .values()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .cloned())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_code(&self, code: &OrderCode) -> Result<Option<OrderRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|o| o.order_code == *code)
            .cloned())
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        orders.sort_by(|a, b| a.placed_at.cmp(&b.placed_at).then(a.id.cmp(&b.id)));

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders.into_iter().skip(offset).take(limit).collect())
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .order_items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.position, i.id));
        Ok(items)
    }
}

//! Cart service providing the cart engine API.

use std::collections::HashMap;
use std::sync::Arc;

use common::{CartId, Money, ProductId, SessionKey, StoreId};
use storage::{ChangeSet, StorageError, StorefrontStore, constraint};

use crate::clock::{Clock, SystemClock};
use crate::error::DomainError;

use super::Cart;

/// Service for managing shopping carts.
///
/// Every mutating call reads the cart, plans the change on the [`Cart`]
/// aggregate and commits it in one change set. Calls take and return whole
/// carts so callers always see the lines together with the total.
pub struct CartService<S: StorefrontStore> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: StorefrontStore> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the cart of a session in a store, creating it on first use.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create_cart(
        &self,
        session_key: &SessionKey,
        store_id: StoreId,
    ) -> Result<Cart, DomainError> {
        if let Some(cart) = self.find_cart(session_key, store_id).await? {
            return Ok(cart);
        }

        let cart = Cart::open(session_key.clone(), store_id, self.clock.now());
        match self
            .store
            .commit(ChangeSet::new().insert(cart.record().clone()))
            .await
        {
            Ok(()) => {
                tracing::debug!(cart_id = %cart.id(), "cart created");
                Ok(cart)
            }
            // Another request created it first.
            Err(StorageError::UniqueViolation {
                constraint: constraint::CART_SESSION_STORE,
                ..
            }) => self
                .find_cart(session_key, store_id)
                .await?
                .ok_or_else(|| DomainError::not_found("cart", session_key)),
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up a session's cart without creating one.
    #[tracing::instrument(skip(self))]
    pub async fn find_cart(
        &self,
        session_key: &SessionKey,
        store_id: StoreId,
    ) -> Result<Option<Cart>, DomainError> {
        match self.store.find_cart(session_key, store_id).await? {
            Some(record) => {
                let items = self.store.cart_items(record.id).await?;
                Ok(Some(Cart::new(record, items)))
            }
            None => Ok(None),
        }
    }

    /// Loads a cart with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: CartId) -> Result<Cart, DomainError> {
        let record = self
            .store
            .get_cart(cart_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart", cart_id))?;
        let items = self.store.cart_items(cart_id).await?;
        Ok(Cart::new(record, items))
    }

    /// Adds a product to a cart, merging with an existing line.
    ///
    /// Inventory is not checked here; see [`CartService::verify_stock`].
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let cart = self.get_cart(cart_id).await?;
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))?;

        let changes = cart.add_item(&product, quantity, self.clock.now())?;
        self.store.commit(changes).await?;

        metrics::counter!("storefront_cart_items_added_total").increment(u64::from(quantity));
        self.get_cart(cart_id).await
    }

    /// Sets the quantity of a line. Zero removes the line; negative is invalid.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        let cart = self.get_cart(cart_id).await?;
        match cart.update_quantity(product_id, quantity, self.clock.now())? {
            Some(changes) => {
                self.store.commit(changes).await?;
                self.get_cart(cart_id).await
            }
            None => Ok(cart),
        }
    }

    /// Removes a product's line. Absent lines are ignored.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<Cart, DomainError> {
        let cart = self.get_cart(cart_id).await?;
        match cart.remove_item(product_id, self.clock.now()) {
            Some(changes) => {
                self.store.commit(changes).await?;
                self.get_cart(cart_id).await
            }
            None => Ok(cart),
        }
    }

    /// Removes every line; the cart itself stays for reuse.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, cart_id: CartId) -> Result<Cart, DomainError> {
        let cart = self.get_cart(cart_id).await?;
        match cart.clear(self.clock.now()) {
            Some(changes) => {
                self.store.commit(changes).await?;
                self.get_cart(cart_id).await
            }
            None => Ok(cart),
        }
    }

    /// Sum of the cart's line subtotals.
    #[tracing::instrument(skip(self))]
    pub async fn total(&self, cart_id: CartId) -> Result<Money, DomainError> {
        Ok(self.get_cart(cart_id).await?.total()?)
    }

    /// Checks that current inventory covers every line of the cart.
    #[tracing::instrument(skip(self))]
    pub async fn verify_stock(&self, cart_id: CartId) -> Result<(), DomainError> {
        let cart = self.get_cart(cart_id).await?;
        let products = load_products(&self.store, &cart).await?;
        cart.check_stock(&products)
    }
}

/// Loads every product a cart references.
pub(crate) async fn load_products<S: StorefrontStore + ?Sized>(
    store: &S,
    cart: &Cart,
) -> Result<HashMap<ProductId, storage::ProductRecord>, DomainError> {
    let mut products = HashMap::with_capacity(cart.item_count());
    for item in cart.items() {
        let product = store
            .get_product(item.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", item.product_id))?;
        products.insert(product.id, product);
    }
    Ok(products)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use storage::{InMemoryStorefrontStore, ProductRecord, StoreRecord, Version};

    use super::*;
    use crate::error::{ConflictError, ValidationError};

    async fn seeded() -> (InMemoryStorefrontStore, StoreRecord, ProductRecord) {
        let store = InMemoryStorefrontStore::new();
        let now = Utc::now();
        let shop = StoreRecord {
            id: StoreId::new(),
            name: "Acme".to_string(),
            owner: "owner-1".to_string(),
            description: String::new(),
            email: "acme@example.com".to_string(),
            phone: "555-0000".to_string(),
            created_at: now,
            updated_at: now,
            version: Version::first(),
        };
        let product = ProductRecord {
            id: ProductId::new(),
            store_id: shop.id,
            name: "Widget".to_string(),
            description: String::new(),
            price: Money::from_cents(999),
            inventory: 10,
            units_sold: 0,
            total_revenue: Money::zero(),
            created_at: now,
            updated_at: now,
            version: Version::first(),
        };
        store
            .commit(ChangeSet::new().insert(shop.clone()).insert(product.clone()))
            .await
            .unwrap();
        (store, shop, product)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (store, shop, _) = seeded().await;
        let service = CartService::new(store);
        let session = SessionKey::new("s1");

        let first = service.get_or_create_cart(&session, shop.id).await.unwrap();
        let second = service.get_or_create_cart(&session, shop.id).await.unwrap();
        assert_eq!(first.id(), second.id());
        assert!(second.is_empty());

        let other = service
            .get_or_create_cart(&SessionKey::new("s2"), shop.id)
            .await
            .unwrap();
        assert_ne!(other.id(), first.id());
    }

    #[tokio::test]
    async fn test_add_item_merges_and_locks_price() {
        let (store, shop, product) = seeded().await;
        let service = CartService::new(store.clone());
        let cart = service
            .get_or_create_cart(&SessionKey::new("s1"), shop.id)
            .await
            .unwrap();

        service.add_item(cart.id(), product.id, 2).await.unwrap();

        let mut repriced = product.clone();
        repriced.price = Money::from_cents(1999);
        store.commit(ChangeSet::new().update(repriced)).await.unwrap();

        let cart = service.add_item(cart.id(), product.id, 3).await.unwrap();
        assert_eq!(cart.item_count(), 1);
        let line = cart.item(product.id).unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(line.price, Money::from_cents(999));
        assert_eq!(cart.total().unwrap(), Money::from_cents(4995));
    }

    #[tokio::test]
    async fn test_update_remove_and_clear() {
        let (store, shop, product) = seeded().await;
        let service = CartService::new(store);
        let cart = service
            .get_or_create_cart(&SessionKey::new("s1"), shop.id)
            .await
            .unwrap();
        service.add_item(cart.id(), product.id, 2).await.unwrap();

        let cart = service
            .update_quantity(cart.id(), product.id, 4)
            .await
            .unwrap();
        assert_eq!(cart.item(product.id).unwrap().quantity, 4);

        let err = service
            .update_quantity(cart.id(), product.id, -3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::InvalidQuantity { quantity: -3 })
        ));

        let cart = service
            .update_quantity(cart.id(), product.id, 0)
            .await
            .unwrap();
        assert!(cart.is_empty());

        // Removing an absent line is a no-op.
        let cart = service.remove_item(cart.id(), product.id).await.unwrap();
        assert!(cart.is_empty());

        service.add_item(cart.id(), product.id, 1).await.unwrap();
        let cleared = service.clear(cart.id()).await.unwrap();
        assert!(cleared.is_empty());
        assert_eq!(cleared.id(), cart.id());
        assert_eq!(service.total(cart.id()).await.unwrap(), Money::zero());
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let (store, shop, _) = seeded().await;
        let service = CartService::new(store);
        let cart = service
            .get_or_create_cart(&SessionKey::new("s1"), shop.id)
            .await
            .unwrap();

        let err = service
            .add_item(cart.id(), ProductId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn test_stale_cart_write_conflicts() {
        let (store, shop, product) = seeded().await;
        let service = CartService::new(store.clone());
        let cart = service
            .get_or_create_cart(&SessionKey::new("s1"), shop.id)
            .await
            .unwrap();

        // Two writers read the same cart; the second commit must lose.
        let now = Utc::now();
        let first = cart.add_item(&product, 1, now).unwrap();
        let second = cart.add_item(&product, 1, now).unwrap();
        store.commit(first).await.unwrap();
        let err = DomainError::from(store.commit(second).await.unwrap_err());
        assert!(matches!(
            err,
            DomainError::Conflict(ConflictError::ConcurrentModification(_))
        ));

        let cart = service.get_cart(cart.id()).await.unwrap();
        assert_eq!(cart.item(product.id).unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_verify_stock() {
        let (store, shop, product) = seeded().await;
        let service = CartService::new(store);
        let cart = service
            .get_or_create_cart(&SessionKey::new("s1"), shop.id)
            .await
            .unwrap();

        service.add_item(cart.id(), product.id, 10).await.unwrap();
        service.verify_stock(cart.id()).await.unwrap();

        service.add_item(cart.id(), product.id, 1).await.unwrap();
        let err = service.verify_stock(cart.id()).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::InsufficientInventory {
                available: 10,
                requested: 11,
                ..
            })
        ));
    }
}

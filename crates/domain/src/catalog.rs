//! Store and product maintenance done by store owners.

use std::sync::Arc;

use common::{Money, ProductId, StoreId};
use serde::{Deserialize, Serialize};
use storage::{ChangeSet, ProductRecord, RowKey, StoreRecord, StorefrontStore, Version};

use crate::clock::{Clock, SystemClock};
use crate::error::{DomainError, ValidationError};
use crate::pricing;

const STORE_NAME_MAX: usize = 100;
const PRODUCT_NAME_MAX: usize = 200;
const EMAIL_MAX: usize = 255;
const PHONE_MAX: usize = 20;

/// Details of a store to register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStore {
    pub name: String,
    pub owner: String,
    pub description: String,
    pub email: String,
    pub phone: String,
}

/// Details of a product to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub inventory: u32,
}

/// Owner edit of a product. `None` leaves a field as is.
///
/// Sales counters are not editable; only fulfillment moves them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub inventory: Option<u32>,
}

/// Service for store owners' catalog edits.
pub struct CatalogService<S: StorefrontStore> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: StorefrontStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[tracing::instrument(skip(self, details), fields(name = %details.name))]
    pub async fn register_store(&self, details: NewStore) -> Result<StoreRecord, DomainError> {
        text("name", &details.name, STORE_NAME_MAX, true)?;
        text("owner", &details.owner, EMAIL_MAX, true)?;
        text("email", &details.email, EMAIL_MAX, false)?;
        text("phone", &details.phone, PHONE_MAX, false)?;

        let now = self.clock.now();
        let record = StoreRecord {
            id: StoreId::new(),
            name: details.name.trim().to_string(),
            owner: details.owner,
            description: details.description,
            email: details.email.trim().to_string(),
            phone: details.phone.trim().to_string(),
            created_at: now,
            updated_at: now,
            version: Version::first(),
        };
        self.store
            .commit(ChangeSet::new().insert(record.clone()))
            .await?;

        tracing::debug!(store_id = %record.id, "store registered");
        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_store(&self, store_id: StoreId) -> Result<StoreRecord, DomainError> {
        self.store
            .get_store(store_id)
            .await?
            .ok_or_else(|| DomainError::not_found("store", store_id))
    }

    /// Deletes a store with its products, carts and orders.
    #[tracing::instrument(skip(self))]
    pub async fn delete_store(&self, store_id: StoreId) -> Result<(), DomainError> {
        let shop = self.get_store(store_id).await?;
        self.store
            .commit(ChangeSet::new().delete(RowKey::Store(shop.id), shop.version))
            .await?;
        tracing::debug!(%store_id, "store deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, details), fields(name = %details.name))]
    pub async fn add_product(
        &self,
        store_id: StoreId,
        details: NewProduct,
    ) -> Result<ProductRecord, DomainError> {
        self.get_store(store_id).await?;
        text("name", &details.name, PRODUCT_NAME_MAX, true)?;
        price(details.price)?;

        let now = self.clock.now();
        let record = ProductRecord {
            id: ProductId::new(),
            store_id,
            name: details.name.trim().to_string(),
            description: details.description,
            price: details.price,
            inventory: details.inventory,
            units_sold: 0,
            total_revenue: Money::zero(),
            created_at: now,
            updated_at: now,
            version: Version::first(),
        };
        self.store
            .commit(ChangeSet::new().insert(record.clone()))
            .await?;

        tracing::debug!(product_id = %record.id, %store_id, "product added");
        Ok(record)
    }

    /// Applies an owner edit.
    ///
    /// A new price only affects lines added to carts afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(
        &self,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> Result<ProductRecord, DomainError> {
        let mut product = self.get_product(product_id).await?;

        if let Some(name) = update.name {
            text("name", &name, PRODUCT_NAME_MAX, true)?;
            product.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(amount) = update.price {
            price(amount)?;
            product.price = amount;
        }
        if let Some(inventory) = update.inventory {
            product.inventory = inventory;
        }
        product.updated_at = self.clock.now();

        self.store
            .commit(ChangeSet::new().update(product))
            .await?;
        self.get_product(product_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<ProductRecord, DomainError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id))
    }

    /// Lists a store's products, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, store_id: StoreId) -> Result<Vec<ProductRecord>, DomainError> {
        self.get_store(store_id).await?;
        Ok(self.store.list_products(store_id).await?)
    }

    /// Deletes a product together with the cart and order lines that
    /// reference it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), DomainError> {
        let product = self.get_product(product_id).await?;
        self.store
            .commit(ChangeSet::new().delete(RowKey::Product(product.id), product.version))
            .await?;
        tracing::debug!(%product_id, "product deleted");
        Ok(())
    }
}

fn text(field: &'static str, value: &str, max: usize, required: bool) -> Result<(), ValidationError> {
    if required && value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.trim().chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}

fn price(amount: Money) -> Result<(), ValidationError> {
    pricing::check_amount("price", amount)
}

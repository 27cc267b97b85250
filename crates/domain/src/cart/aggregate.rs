//! Cart aggregate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, Money, ProductId, SessionKey, StoreId};
use storage::{CartItemRecord, CartRecord, ChangeSet, ProductRecord, RowKey, Version};

use crate::error::{DomainError, ValidationError};
use crate::pricing;

/// A cart with its lines, as read in one go.
///
/// Command methods never write; they return the [`ChangeSet`] that applies
/// the command. Each change set also updates the cart row at the version
/// it was read with, so two writers racing on one cart cannot both commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    record: CartRecord,
    items: Vec<CartItemRecord>,
}

// Query methods
impl Cart {
    pub fn new(record: CartRecord, items: Vec<CartItemRecord>) -> Self {
        Self { record, items }
    }

    /// Builds a fresh, empty cart for a session in a store.
    pub fn open(session_key: SessionKey, store_id: StoreId, now: DateTime<Utc>) -> Self {
        Self {
            record: CartRecord {
                id: CartId::new(),
                session_key,
                store_id,
                created_at: now,
                updated_at: now,
                version: Version::first(),
            },
            items: Vec::new(),
        }
    }

    pub fn id(&self) -> CartId {
        self.record.id
    }

    pub fn store_id(&self) -> StoreId {
        self.record.store_id
    }

    pub fn session_key(&self) -> &SessionKey {
        &self.record.session_key
    }

    pub fn record(&self) -> &CartRecord {
        &self.record
    }

    /// Lines in the order they were added.
    pub fn items(&self) -> &[CartItemRecord] {
        &self.items
    }

    /// Returns the line for a product.
    pub fn item(&self, product_id: ProductId) -> Option<&CartItemRecord> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of all line subtotals; zero for an empty cart.
    pub fn total(&self) -> Result<Money, ValidationError> {
        pricing::total(&self.items)
    }

    /// Checks every line against current product inventory.
    ///
    /// `products` must hold every product the cart references.
    pub fn check_stock(
        &self,
        products: &HashMap<ProductId, ProductRecord>,
    ) -> Result<(), DomainError> {
        for item in &self.items {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| DomainError::not_found("product", item.product_id))?;
            if item.quantity > product.inventory {
                return Err(ValidationError::InsufficientInventory {
                    product_id: product.id,
                    available: product.inventory,
                    requested: item.quantity,
                }
                .into());
            }
        }
        Ok(())
    }
}

// Command methods (return changes)
impl Cart {
    /// Adds `quantity` of `product`, merging into an existing line.
    ///
    /// A merged line keeps the price it was first added at.
    pub fn add_item(
        &self,
        product: &ProductRecord,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<ChangeSet, DomainError> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity { quantity: 0 }.into());
        }
        if product.store_id != self.record.store_id {
            return Err(DomainError::not_found("product", product.id));
        }

        let changes = self.touch(now);
        match self.item(product.id) {
            Some(existing) => {
                let merged = existing.quantity.checked_add(quantity).ok_or(
                    ValidationError::InvalidQuantity {
                        quantity: i64::from(existing.quantity) + i64::from(quantity),
                    },
                )?;
                let mut line = existing.clone();
                line.quantity = merged;
                self.check_total_with(&line)?;
                Ok(changes.update(line))
            }
            None => {
                let line = CartItemRecord {
                    id: CartItemId::new(),
                    cart_id: self.record.id,
                    product_id: product.id,
                    quantity,
                    price: product.price,
                    added_at: now,
                    version: Version::first(),
                };
                self.check_total_with(&line)?;
                Ok(changes.insert(line))
            }
        }
    }

    /// Sets the quantity of a line; zero removes it.
    ///
    /// Returns `None` when there is nothing to change.
    pub fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ChangeSet>, DomainError> {
        if quantity < 0 {
            return Err(ValidationError::InvalidQuantity { quantity }.into());
        }
        if quantity == 0 {
            return Ok(self.remove_item(product_id, now));
        }

        let quantity =
            u32::try_from(quantity).map_err(|_| ValidationError::InvalidQuantity { quantity })?;
        let existing = self
            .item(product_id)
            .ok_or_else(|| DomainError::not_found("cart item", product_id))?;
        if existing.quantity == quantity {
            return Ok(None);
        }

        let mut line = existing.clone();
        line.quantity = quantity;
        self.check_total_with(&line)?;
        Ok(Some(self.touch(now).update(line)))
    }

    /// Removes the line for a product. `None` if there is no such line.
    pub fn remove_item(&self, product_id: ProductId, now: DateTime<Utc>) -> Option<ChangeSet> {
        self.item(product_id).map(|line| {
            self.touch(now)
                .delete(RowKey::CartItem(line.id), line.version)
        })
    }

    /// Removes every line. `None` if the cart is already empty.
    pub fn clear(&self, now: DateTime<Utc>) -> Option<ChangeSet> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.clear_into(self.touch(now)))
    }

    /// Appends deletes of every line, each guarded by its read version.
    pub(crate) fn clear_into(&self, mut changes: ChangeSet) -> ChangeSet {
        for line in &self.items {
            changes = changes.delete(RowKey::CartItem(line.id), line.version);
        }
        changes
    }

    /// Checks that the cart total still fits once `line` is written.
    fn check_total_with(&self, line: &CartItemRecord) -> Result<(), ValidationError> {
        let others = self.items.iter().filter(|i| i.product_id != line.product_id);
        pricing::total(others.chain(std::iter::once(line)))?;
        Ok(())
    }

    /// Starts a change set with the cart row re-stamped at its read version.
    pub(crate) fn touch(&self, now: DateTime<Utc>) -> ChangeSet {
        let mut record = self.record.clone();
        record.updated_at = now;
        ChangeSet::new().update(record)
    }
}

//! Order aggregate implementation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{Money, OrderCode, OrderId, OrderItemId, OrderStatus, ProductId, StoreId};
use storage::{ChangeSet, OrderItemRecord, OrderRecord, ProductRecord, Version};

use crate::cart::Cart;
use crate::error::{DomainError, ValidationError};
use crate::pricing::{self, LineItem};

use super::{Checkout, ReviseOrder};

/// Order aggregate root: the order row together with its lines.
///
/// Command methods validate against the current state and return the rows
/// to write. Nothing is persisted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    record: OrderRecord,
    items: Vec<OrderItemRecord>,
}

/// Rows written by a fulfillment: the settled order and every product whose
/// inventory and revenue moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfilment {
    pub order: OrderRecord,
    pub products: Vec<ProductRecord>,
}

// Query methods
impl Order {
    pub fn new(record: OrderRecord, items: Vec<OrderItemRecord>) -> Self {
        Self { record, items }
    }

    pub fn id(&self) -> OrderId {
        self.record.id
    }

    pub fn store_id(&self) -> StoreId {
        self.record.store_id
    }

    pub fn code(&self) -> &OrderCode {
        &self.record.order_code
    }

    pub fn status(&self) -> OrderStatus {
        self.record.status
    }

    pub fn record(&self) -> &OrderRecord {
        &self.record
    }

    pub fn items(&self) -> &[OrderItemRecord] {
        &self.items
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItemRecord> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Amount quoted at checkout.
    pub fn total_amount(&self) -> Money {
        self.record.total_amount
    }

    /// Settled amount, once known.
    pub fn final_total_amount(&self) -> Option<Money> {
        self.record.final_total_amount
    }

    /// Sum of the final line subtotals.
    pub fn final_subtotal(&self) -> Result<Money, ValidationError> {
        pricing::final_total(&self.items)
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.record.placed_at
    }

    pub fn fulfilled_at(&self) -> Option<DateTime<Utc>> {
        self.record.fulfilled_at
    }

    pub fn notes(&self) -> &str {
        &self.record.notes
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.record.status.is_terminal()
    }

    /// Lines whose quantity or final price differ from `original`.
    pub fn changed_items(&self, original: &Order) -> Vec<OrderItemRecord> {
        self.items
            .iter()
            .filter(|item| original.item(item.id) != Some(*item))
            .cloned()
            .collect()
    }
}

// Command methods (return rows to write)
impl Order {
    /// Plans the conversion of a cart into a placed order.
    ///
    /// The change set inserts the order and one line per cart line, deletes
    /// the cart lines at their read versions and re-stamps the cart, so a
    /// second checkout of the same cart cannot commit.
    pub fn place(
        cart: &Cart,
        cmd: &Checkout,
        code: OrderCode,
        now: DateTime<Utc>,
    ) -> Result<(Order, ChangeSet), DomainError> {
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let total_amount = cart.total()?;
        pricing::check_amount("total_amount", total_amount)?;

        let record = OrderRecord {
            id: OrderId::new(),
            store_id: cart.store_id(),
            customer_name: cmd.customer_name.trim().to_string(),
            customer_phone: cmd.customer_phone.trim().to_string(),
            delivery_location: cmd.delivery_location.trim().to_string(),
            order_code: code,
            total_amount,
            final_total_amount: None,
            status: OrderStatus::Placed,
            notes: cmd.notes.clone(),
            placed_at: now,
            fulfilled_at: None,
            updated_at: now,
            version: Version::first(),
        };

        let items: Vec<OrderItemRecord> = cart
            .items()
            .iter()
            .zip(0u32..)
            .map(|(line, position)| OrderItemRecord {
                id: OrderItemId::new(),
                order_id: record.id,
                product_id: line.product_id,
                position,
                quantity: line.quantity,
                price: line.price,
                final_price: None,
                version: Version::first(),
            })
            .collect();

        let mut changes = cart.touch(now).insert(record.clone());
        for item in &items {
            changes = changes.insert(item.clone());
        }
        let changes = cart.clear_into(changes);

        Ok((Order::new(record, items), changes))
    }

    /// Plans a status change other than fulfillment.
    ///
    /// Returns `None` when the order already has the requested status.
    pub fn transition(
        &self,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<OrderRecord>, DomainError> {
        let from = self.record.status;
        if from == to && !from.is_terminal() {
            return Ok(None);
        }
        if to == OrderStatus::Fulfilled || !from.can_transition_to(to) {
            return Err(ValidationError::IllegalTransition { from, to }.into());
        }

        let mut record = self.record.clone();
        record.status = to;
        record.updated_at = now;
        Ok(Some(record))
    }

    /// Plans the fulfillment of the order.
    ///
    /// The final total is `final_amount` if given, else a total settled by
    /// an earlier revision, else the quoted total. Every product loses the
    /// line quantity from inventory and gains it in `units_sold`, and gains
    /// the final line subtotal in revenue. Fails without writing anything if
    /// the order is already settled or inventory does not cover a line.
    pub fn fulfil(
        &self,
        final_amount: Option<Money>,
        products: &HashMap<ProductId, ProductRecord>,
        now: DateTime<Utc>,
    ) -> Result<Fulfilment, DomainError> {
        let from = self.record.status;
        if from.is_terminal() {
            return Err(ValidationError::IllegalTransition {
                from,
                to: OrderStatus::Fulfilled,
            }
            .into());
        }

        let final_total = final_amount
            .or(self.record.final_total_amount)
            .unwrap_or(self.record.total_amount);
        pricing::check_amount("final_total_amount", final_total)?;

        let mut updated: Vec<ProductRecord> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let index = match updated.iter().position(|p| p.id == item.product_id) {
                Some(index) => index,
                None => {
                    let product = products
                        .get(&item.product_id)
                        .ok_or_else(|| DomainError::not_found("product", item.product_id))?;
                    updated.push(product.clone());
                    updated.len() - 1
                }
            };

            let product = &mut updated[index];
            if product.inventory < item.quantity {
                return Err(ValidationError::InsufficientInventory {
                    product_id: product.id,
                    available: product.inventory,
                    requested: item.quantity,
                }
                .into());
            }
            product.inventory -= item.quantity;
            product.units_sold += u64::from(item.quantity);
            product.total_revenue =
                pricing::add("total_revenue", product.total_revenue, item.final_subtotal()?)?;
            product.updated_at = now;
        }

        let mut order = self.record.clone();
        order.status = OrderStatus::Fulfilled;
        order.final_total_amount = Some(final_total);
        if order.fulfilled_at.is_none() {
            order.fulfilled_at = Some(now);
        }
        order.updated_at = now;

        Ok(Fulfilment {
            order,
            products: updated,
        })
    }

    /// Applies line, notes and total revisions, returning the revised order.
    ///
    /// Versions are left untouched so the result can be written as updates
    /// of the rows that were read. The requested status is not applied here.
    pub fn revise(&self, cmd: &ReviseOrder, now: DateTime<Utc>) -> Result<Order, DomainError> {
        if self.is_terminal() {
            return Err(ValidationError::OrderClosed {
                status: self.record.status,
            }
            .into());
        }

        let mut revised = self.clone();
        for revision in &cmd.items {
            let item = revised
                .items
                .iter_mut()
                .find(|i| i.id == revision.item_id)
                .ok_or(ValidationError::ItemNotInOrder {
                    item_id: revision.item_id,
                })?;

            if let Some(quantity) = revision.quantity {
                if quantity == 0 {
                    return Err(ValidationError::InvalidQuantity { quantity: 0 }.into());
                }
                item.quantity = quantity;
            }
            if let Some(price) = revision.final_price {
                pricing::check_amount("final_price", price)?;
                item.final_price = Some(price);
            }
            item.final_subtotal()?;
        }

        if let Some(notes) = &cmd.notes {
            revised.record.notes = notes.clone();
        }

        match cmd.final_total_amount {
            Some(amount) => {
                pricing::check_amount("final_total_amount", amount)?;
                revised.record.final_total_amount = Some(amount);
            }
            None if !cmd.items.is_empty() => {
                let settled = revised.final_subtotal()?;
                pricing::check_amount("final_total_amount", settled)?;
                revised.record.final_total_amount = Some(settled);
            }
            None => {}
        }

        revised.record.updated_at = now;
        Ok(revised)
    }
}

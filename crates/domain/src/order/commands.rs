//! Order commands.

use common::{CartId, Money, OrderId, OrderItemId, OrderStatus};

use crate::config::EngineConfig;
use crate::error::ValidationError;

/// Command to convert a cart into an order.
#[derive(Debug, Clone)]
pub struct Checkout {
    /// The cart to check out.
    pub cart_id: CartId,

    pub customer_name: String,

    pub customer_phone: String,

    /// Free-text delivery address.
    pub delivery_location: String,

    /// Optional note from the customer.
    pub notes: String,
}

impl Checkout {
    /// Creates a new Checkout command.
    pub fn new(
        cart_id: CartId,
        customer_name: impl Into<String>,
        customer_phone: impl Into<String>,
        delivery_location: impl Into<String>,
    ) -> Self {
        Self {
            cart_id,
            customer_name: customer_name.into(),
            customer_phone: customer_phone.into(),
            delivery_location: delivery_location.into(),
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Checks the customer details against the configured limits.
    pub fn validate(&self, config: &EngineConfig) -> Result<(), ValidationError> {
        required("customer_name", &self.customer_name, config.customer_name_max)?;
        required("customer_phone", &self.customer_phone, config.customer_phone_max)?;
        if self.delivery_location.trim().is_empty() {
            return Err(ValidationError::MissingField("delivery_location"));
        }
        Ok(())
    }
}

fn required(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(())
}

/// Change to a single order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRevision {
    /// The line to revise.
    pub item_id: OrderItemId,

    /// New quantity, if it changed.
    pub quantity: Option<u32>,

    /// Settled unit price, if renegotiated.
    pub final_price: Option<Money>,
}

impl ItemRevision {
    pub fn new(item_id: OrderItemId) -> Self {
        Self {
            item_id,
            quantity: None,
            final_price: None,
        }
    }

    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn final_price(mut self, price: Money) -> Self {
        self.final_price = Some(price);
        self
    }
}

/// Command to revise an open order before it settles.
///
/// Item revisions and notes are applied first; a requested status change
/// (including fulfillment) then runs on the revised order, in the same
/// commit.
#[derive(Debug, Clone, Default)]
pub struct ReviseOrder {
    /// The order to revise.
    pub order_id: OrderId,

    pub items: Vec<ItemRevision>,

    /// Replacement notes.
    pub notes: Option<String>,

    /// Settled order total. When absent and lines were revised, the total
    /// is recomputed from the final line subtotals.
    pub final_total_amount: Option<Money>,

    /// Status to move to once the revision is applied.
    pub status: Option<OrderStatus>,
}

impl ReviseOrder {
    /// Creates an empty revision of an order.
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            ..Default::default()
        }
    }

    pub fn item(mut self, revision: ItemRevision) -> Self {
        self.items.push(revision);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn final_total_amount(mut self, amount: Money) -> Self {
        self.final_total_amount = Some(amount);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }
}

//! Line subtotals and totals.
//!
//! All arithmetic stays in integer cents, so a subtotal is exact. Every
//! operation is checked: an amount that does not fit is a validation error
//! rather than a wrapped or panicking value.

use common::Money;
use storage::{CartItemRecord, OrderItemRecord};

use crate::error::ValidationError;

/// Subtotal of a line: `price * quantity`.
pub fn subtotal(price: Money, quantity: u32) -> Result<Money, ValidationError> {
    price
        .checked_mul(quantity)
        .ok_or(ValidationError::AmountOutOfRange { field: "subtotal" })
}

/// Adds `amount` to `acc`, naming `field` if the result does not fit.
pub fn add(field: &'static str, acc: Money, amount: Money) -> Result<Money, ValidationError> {
    acc.checked_add(amount)
        .ok_or(ValidationError::AmountOutOfRange { field })
}

/// Checks a price or settled amount entered by a person: not negative and
/// at most [`Money::MAX_AMOUNT`].
pub fn check_amount(field: &'static str, amount: Money) -> Result<(), ValidationError> {
    if amount.is_negative() {
        return Err(ValidationError::NegativeAmount { field, amount });
    }
    if amount > Money::MAX_AMOUNT {
        return Err(ValidationError::AmountOutOfRange { field });
    }
    Ok(())
}

/// Sum of line subtotals.
pub fn total<'a, L: LineItem + 'a>(
    lines: impl IntoIterator<Item = &'a L>,
) -> Result<Money, ValidationError> {
    lines
        .into_iter()
        .try_fold(Money::zero(), |acc, line| add("total", acc, line.subtotal()?))
}

/// Sum of final line subtotals.
pub fn final_total<'a, L: LineItem + 'a>(
    lines: impl IntoIterator<Item = &'a L>,
) -> Result<Money, ValidationError> {
    lines.into_iter().try_fold(Money::zero(), |acc, line| {
        add("final_total_amount", acc, line.final_subtotal()?)
    })
}

/// A priced line in a cart or an order.
pub trait LineItem {
    /// Quantity on the line.
    fn quantity(&self) -> u32;

    /// Price captured when the line was created.
    fn price(&self) -> Money;

    /// Settled price. Lines that were never renegotiated settle at `price`.
    fn final_price(&self) -> Money {
        self.price()
    }

    /// `price * quantity`.
    fn subtotal(&self) -> Result<Money, ValidationError> {
        subtotal(self.price(), self.quantity())
    }

    /// `final_price * quantity`.
    fn final_subtotal(&self) -> Result<Money, ValidationError> {
        subtotal(self.final_price(), self.quantity())
    }
}

impl LineItem for CartItemRecord {
    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn price(&self) -> Money {
        self.price
    }
}

impl LineItem for OrderItemRecord {
    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn price(&self) -> Money {
        self.price
    }

    fn final_price(&self) -> Money {
        self.final_price.unwrap_or(self.price)
    }
}

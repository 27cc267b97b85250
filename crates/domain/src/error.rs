//! Domain error types.

use common::{MalformedOrderCode, Money, OrderItemId, OrderStatus, ProductId};
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur during storefront operations.
///
/// The variants follow who can fix the problem: the caller (`Validation`),
/// nobody because the thing is gone (`NotFound`), a retry (`Conflict`) or
/// the operator (`Persistence`).
#[derive(Debug, Error)]
pub enum DomainError {
    /// Caller-correctable input problem.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist or belongs to another parent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A concurrent writer or a uniqueness rule got in the way.
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// The persistence layer failed to commit or read.
    #[error("Persistence failure: {0}")]
    Persistence(StorageError),
}

impl DomainError {
    /// Builds a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true for errors the caller can fix by changing the input.
    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::Validation(_))
    }

    /// Returns true for errors that may succeed when retried.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict(_))
    }
}

/// Input problems reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cart has no items")]
    EmptyCart,

    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: i64 },

    #[error("Illegal status transition from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order is {status} and can no longer be revised")]
    OrderClosed { status: OrderStatus },

    #[error("Insufficient inventory for product {product_id}: {available} available, {requested} requested")]
    InsufficientInventory {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    #[error("{field} cannot be negative (got {amount})")]
    NegativeAmount { field: &'static str, amount: Money },

    #[error("{field} is out of range")]
    AmountOutOfRange { field: &'static str },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error(transparent)]
    MalformedOrderCode(#[from] MalformedOrderCode),

    #[error("Item {item_id} is not part of this order")]
    ItemNotInOrder { item_id: OrderItemId },
}

/// Failures caused by competing writes or exhausted identifier space.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// Every order code tried was already taken.
    #[error("No free order code after {attempts} attempts")]
    OrderCodeSpaceExhausted { attempts: u32 },

    /// A row changed between read and write.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// A unique key is already taken.
    #[error("Duplicate value {value} for {constraint}")]
    Duplicate {
        constraint: &'static str,
        value: String,
    },
}

impl From<StorageError> for DomainError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ConcurrencyConflict { .. } => {
                DomainError::Conflict(ConflictError::ConcurrentModification(e.to_string()))
            }
            StorageError::UniqueViolation { constraint, value } => {
                DomainError::Conflict(ConflictError::Duplicate { constraint, value })
            }
            StorageError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Persistence(other),
        }
    }
}

impl From<MalformedOrderCode> for DomainError {
    fn from(e: MalformedOrderCode) -> Self {
        DomainError::Validation(ValidationError::MalformedOrderCode(e))
    }
}

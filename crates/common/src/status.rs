//! Order status and its transition table.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of an order in its lifecycle.
///
/// ```text
/// Placed ──► Confirmed ──► InDelivery ──► Fulfilled
///   │            │             │
///   └────────────┴─────────────┴──► Cancelled
/// ```
///
/// Forward moves may skip intermediate steps (an owner can fulfil a placed
/// order directly). `Fulfilled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial state, set at checkout.
    #[default]
    Placed,

    /// The store owner accepted the order.
    Confirmed,

    /// The order is on its way to the customer.
    InDelivery,

    /// Delivered and settled (terminal).
    Fulfilled,

    /// Cancelled (terminal).
    Cancelled,
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0:?}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Confirmed,
        OrderStatus::InDelivery,
        OrderStatus::Fulfilled,
        OrderStatus::Cancelled,
    ];

    /// Position on the forward path, `None` for `Cancelled`.
    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Placed => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::InDelivery => Some(2),
            OrderStatus::Fulfilled => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// Staying in the same status is not a transition and returns false.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }

    /// Returns true if the order counts as pending for store reporting.
    ///
    /// Everything that is not fulfilled is pending, cancelled orders included.
    pub fn is_pending(&self) -> bool {
        !matches!(self, OrderStatus::Fulfilled)
    }

    /// Returns the storage name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Returns the human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Order Placed",
            OrderStatus::Confirmed => "Order Confirmed",
            OrderStatus::InDelivery => "In Delivery",
            OrderStatus::Fulfilled => "Fulfilled",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

//! Shared value types for the storefront engine.
//!
//! Identifiers, money, order status and order codes are used by both the
//! storage layer and the domain layer, so they live here.

pub mod code;
pub mod money;
pub mod status;
pub mod types;

pub use code::{CODE_ALPHABET, MalformedOrderCode, OrderCode, checksum};
pub use money::{Money, ParseMoneyError};
pub use status::{OrderStatus, UnknownStatus};
pub use types::{CartId, CartItemId, OrderId, OrderItemId, ProductId, SessionKey, StoreId};

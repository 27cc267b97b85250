//! Orders: checkout, lifecycle and tracking codes.

mod aggregate;
mod code;
mod commands;
mod service;

pub use aggregate::{Fulfilment, Order};
pub use code::OrderCodeGenerator;
pub use commands::{Checkout, ItemRevision, ReviseOrder};
pub use service::OrderService;

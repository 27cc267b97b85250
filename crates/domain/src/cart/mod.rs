//! Session-scoped shopping carts.

mod aggregate;
mod service;

pub use aggregate::Cart;
pub use service::CartService;
pub(crate) use service::load_products;

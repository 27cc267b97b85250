//! Storefront order lifecycle engine.
//!
//! This crate holds the core rules of the storefront:
//! - Cart engine with price-locked, per-session carts
//! - Order state machine covering checkout, status changes and fulfillment bookkeeping
//! - Order code generation with bounded collision retry
//! - Store reporting derived from the order collection
//! - Catalog maintenance for store owners
//!
//! Persistence, notifications, time and randomness are injected through
//! [`storage::StorefrontStore`], [`OrderNotifier`], [`Clock`] and [`RandomSource`].

pub mod cart;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod order;
pub mod pricing;
pub mod random;
pub mod reporting;

pub use cart::{Cart, CartService};
pub use catalog::{CatalogService, NewProduct, NewStore, ProductUpdate};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{ConflictError, DomainError, ValidationError};
pub use notify::{InMemoryNotifier, NotifyError, OrderNotification, OrderNotifier, TracingNotifier};
pub use order::{
    Checkout, Fulfilment, ItemRevision, Order, OrderCodeGenerator, OrderService, ReviseOrder,
};
pub use pricing::{LineItem, subtotal};
pub use random::{RandomSource, SequenceRandom, ThreadRandom};
pub use reporting::{ReportingService, StoreSummary};

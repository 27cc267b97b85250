pub mod change;
pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use change::{Change, ChangeSet};
pub use config::StorageConfig;
pub use error::{Result, StorageError};
pub use memory::InMemoryStorefrontStore;
pub use postgres::PostgresStorefrontStore;
pub use query::OrderQuery;
pub use record::{
    CartItemRecord, CartRecord, OrderItemRecord, OrderRecord, ProductRecord, Row, RowKey,
    StoreRecord, Version, Versioned,
};
pub use store::{StorefrontStore, StorefrontStoreExt, constraint};

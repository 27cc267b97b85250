use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the storefront store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A row was modified by someone else since it was read.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A row referenced by a change (or its parent) does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint rejected the write.
    #[error("Unique constraint {constraint} violated by {value}")]
    UniqueViolation {
        constraint: &'static str,
        value: String,
    },

    /// The change set itself is malformed.
    #[error("Invalid change set: {0}")]
    InvalidChangeSet(String),

    /// A stored value could not be mapped back into a record.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The backend refused the commit.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

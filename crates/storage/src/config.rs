//! Database configuration loaded from environment variables.

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{PostgresStorefrontStore, Result, StorageError};

/// Connection settings for the PostgreSQL backend.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: connection string (default: unset, meaning the caller
///   should fall back to the in-memory store)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

impl StorageConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        }
    }

    /// Returns true when a database URL is configured.
    pub fn uses_database(&self) -> bool {
        self.database_url.is_some()
    }

    /// Opens a connection pool.
    pub async fn pool(&self) -> Result<PgPool> {
        let url = self
            .database_url
            .as_deref()
            .ok_or_else(|| StorageError::Unavailable("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(url)
            .await?;
        Ok(pool)
    }

    /// Connects, runs migrations and returns a ready store.
    pub async fn connect(&self) -> Result<PostgresStorefrontStore> {
        let store = PostgresStorefrontStore::new(self.pool().await?);
        store.run_migrations().await?;
        tracing::info!(max_connections = self.max_connections, "storefront database ready");
        Ok(store)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

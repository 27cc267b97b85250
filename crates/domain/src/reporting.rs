//! Per-store order counts and revenue, derived on every read.

use common::{Money, OrderStatus, StoreId};
use serde::{Deserialize, Serialize};
use storage::{OrderQuery, OrderRecord, StorefrontStore, StorefrontStoreExt};

use crate::error::{DomainError, ValidationError};

/// Snapshot of a store's order figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_orders: usize,
    /// Orders not yet fulfilled. Cancelled orders are included.
    pub pending_orders: usize,
    pub total_revenue: Money,
}

/// Read-only reporting over a store's orders.
///
/// Nothing is cached or stored; every call reads the orders again.
pub struct ReportingService<S: StorefrontStore> {
    store: S,
}

impl<S: StorefrontStore> ReportingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Counts every order of a store.
    #[tracing::instrument(skip(self))]
    pub async fn total_orders(&self, store_id: StoreId) -> Result<usize, DomainError> {
        self.ensure_store(store_id).await?;
        Ok(self.store.count_orders(OrderQuery::for_store(store_id)).await?)
    }

    /// Counts orders whose status is anything but fulfilled.
    #[tracing::instrument(skip(self))]
    pub async fn pending_orders(&self, store_id: StoreId) -> Result<usize, DomainError> {
        self.ensure_store(store_id).await?;
        let query = OrderQuery::for_store(store_id).exclude_status(OrderStatus::Fulfilled);
        Ok(self.store.count_orders(query).await?)
    }

    /// Sums the final totals of fulfilled orders.
    #[tracing::instrument(skip(self))]
    pub async fn total_revenue(&self, store_id: StoreId) -> Result<Money, DomainError> {
        self.ensure_store(store_id).await?;
        let query = OrderQuery::for_store(store_id).status(OrderStatus::Fulfilled);
        let orders = self.store.query_orders(query).await?;
        Ok(revenue(&orders)?)
    }

    /// Computes all three figures from a single read of the orders.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, store_id: StoreId) -> Result<StoreSummary, DomainError> {
        self.ensure_store(store_id).await?;
        let orders = self
            .store
            .query_orders(OrderQuery::for_store(store_id))
            .await?;

        let fulfilled: Vec<OrderRecord> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Fulfilled)
            .cloned()
            .collect();

        Ok(StoreSummary {
            total_orders: orders.len(),
            pending_orders: orders.len() - fulfilled.len(),
            total_revenue: revenue(&fulfilled)?,
        })
    }

    async fn ensure_store(&self, store_id: StoreId) -> Result<(), DomainError> {
        match self.store.get_store(store_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("store", store_id)),
        }
    }
}

fn revenue(fulfilled: &[OrderRecord]) -> Result<Money, ValidationError> {
    Money::checked_sum(
        fulfilled
            .iter()
            .map(|o| o.final_total_amount.unwrap_or(o.total_amount)),
    )
    .ok_or(ValidationError::AmountOutOfRange {
        field: "total_revenue",
    })
}

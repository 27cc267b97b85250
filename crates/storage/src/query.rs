use chrono::{DateTime, Utc};
use common::{OrderStatus, StoreId};

use crate::OrderRecord;

/// Builder for order listings.
///
/// Results are ordered by placement time, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Filter by owning store.
    pub store_id: Option<StoreId>,

    /// Only orders in this status.
    pub status: Option<OrderStatus>,

    /// Only orders not in this status.
    pub exclude_status: Option<OrderStatus>,

    /// Orders placed at or after this instant.
    pub placed_from: Option<DateTime<Utc>>,

    /// Orders placed at or before this instant.
    pub placed_to: Option<DateTime<Utc>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,

    /// Number of orders to skip.
    pub offset: Option<usize>,
}

impl OrderQuery {
    /// Creates a query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for the orders of one store.
    pub fn for_store(store_id: StoreId) -> Self {
        Self {
            store_id: Some(store_id),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn exclude_status(mut self, status: OrderStatus) -> Self {
        self.exclude_status = Some(status);
        self
    }

    pub fn placed_from(mut self, at: DateTime<Utc>) -> Self {
        self.placed_from = Some(at);
        self
    }

    pub fn placed_to(mut self, at: DateTime<Utc>) -> Self {
        self.placed_to = Some(at);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `order` passes every filter (pagination aside).
    pub fn matches(&self, order: &OrderRecord) -> bool {
        if let Some(store_id) = self.store_id
            && order.store_id != store_id
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(excluded) = self.exclude_status
            && order.status == excluded
        {
            return false;
        }
        if let Some(from) = self.placed_from
            && order.placed_at < from
        {
            return false;
        }
        if let Some(to) = self.placed_to
            && order.placed_at > to
        {
            return false;
        }
        true
    }
}

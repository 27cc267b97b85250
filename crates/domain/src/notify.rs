//! Order-created notifications.
//!
//! The engine calls the notifier once per successful checkout, after the
//! order has been committed. Delivery (e-mail, queue, webhook) is up to the
//! implementation; a failure here never undoes the order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderCode, OrderId, StoreId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Error reported by a notifier. The engine counts it and moves on.
#[derive(Debug, Clone, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// What a store owner needs to know about a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotification {
    pub store_id: StoreId,
    pub store_name: String,
    pub store_email: String,
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_location: String,
    pub total_amount: Money,
    /// One `"{qty}x {product name}"` entry per order line.
    pub lines: Vec<String>,
    pub placed_at: DateTime<Utc>,
}

impl OrderNotification {
    pub fn subject(&self) -> String {
        format!("New order {}", self.order_code)
    }

    /// Plain-text message body.
    pub fn body(&self) -> String {
        let mut body = format!(
            "Order {} from {} ({})\nDeliver to: {}\n\n",
            self.order_code, self.customer_name, self.customer_phone, self.delivery_location
        );
        for line in &self.lines {
            body.push_str(line);
            body.push('\n');
        }
        body.push_str(&format!("\nTotal: {}\n", self.total_amount));
        body
    }
}

/// Port through which the engine announces new orders.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify_order_created(
        &self,
        notification: &OrderNotification,
    ) -> Result<(), NotifyError>;
}

/// Emits the notification as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl OrderNotifier for TracingNotifier {
    async fn notify_order_created(
        &self,
        notification: &OrderNotification,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            store_id = %notification.store_id,
            store_email = %notification.store_email,
            order_code = %notification.order_code,
            total = %notification.total_amount,
            lines = notification.lines.len(),
            "{}",
            notification.subject()
        );
        Ok(())
    }
}

/// Records notifications in memory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<OrderNotification>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the notifications delivered so far.
    pub async fn sent(&self) -> Vec<OrderNotification> {
        self.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl OrderNotifier for InMemoryNotifier {
    async fn notify_order_created(
        &self,
        notification: &OrderNotification,
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("mail server unreachable".to_string()));
        }
        self.sent.write().await.push(notification.clone());
        Ok(())
    }
}

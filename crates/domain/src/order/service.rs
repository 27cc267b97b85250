//! Order service: checkout, status changes, fulfillment and tracking.

use std::collections::HashMap;
use std::sync::Arc;

use common::{Money, OrderCode, OrderId, OrderStatus, ProductId};
use storage::{
    ChangeSet, OrderQuery, OrderRecord, ProductRecord, StorageError, StoreRecord,
    StorefrontStore, StorefrontStoreExt, constraint,
};

use crate::cart::{Cart, load_products};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{ConflictError, DomainError};
use crate::notify::{OrderNotification, OrderNotifier};
use crate::random::{RandomSource, ThreadRandom};

use super::{Checkout, Order, OrderCodeGenerator, ReviseOrder};

/// Service for managing orders.
///
/// Each operation reads what it needs, plans the write on the [`Order`]
/// aggregate and commits a single change set, so an operation either lands
/// completely or not at all.
pub struct OrderService<S: StorefrontStore, N: OrderNotifier> {
    store: S,
    notifier: N,
    clock: Arc<dyn Clock>,
    codes: OrderCodeGenerator,
    config: EngineConfig,
}

impl<S: StorefrontStore, N: OrderNotifier> OrderService<S, N> {
    /// Creates a new order service with the system clock, a thread-local
    /// RNG and default configuration.
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            codes: OrderCodeGenerator::new(Arc::new(ThreadRandom)),
            config: EngineConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the random source used for order codes.
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.codes = OrderCodeGenerator::new(random);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Converts a cart into a placed order.
    ///
    /// Checks the customer details and current inventory, picks an unused
    /// order code, then commits the order, its lines and the emptied cart
    /// together. The notifier is called after the commit; its failure does
    /// not affect the result.
    #[tracing::instrument(skip(self, cmd), fields(cart_id = %cmd.cart_id))]
    pub async fn create_from_cart(&self, cmd: Checkout) -> Result<Order, DomainError> {
        let started = std::time::Instant::now();

        cmd.validate(&self.config)?;
        let cart = self.load_cart(&cmd).await?;
        if cart.is_empty() {
            return Err(crate::error::ValidationError::EmptyCart.into());
        }

        let shop = self
            .store
            .get_store(cart.store_id())
            .await?
            .ok_or_else(|| DomainError::not_found("store", cart.store_id()))?;
        let products = load_products(&self.store, &cart).await?;
        cart.check_stock(&products)?;

        let order = self.place_with_unique_code(&cart, &cmd, &shop).await?;

        metrics::counter!("storefront_orders_placed_total").increment(1);
        metrics::histogram!("storefront_checkout_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            order_id = %order.id(),
            order_code = %order.code(),
            total = %order.total_amount(),
            items = order.items().len(),
            "order placed"
        );

        self.dispatch_notification(&shop, &order, &products).await;
        Ok(order)
    }

    /// Moves an order to another status.
    ///
    /// Moving to `fulfilled` runs the full fulfillment bookkeeping of
    /// [`OrderService::mark_fulfilled`].
    #[tracing::instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<Order, DomainError> {
        if to == OrderStatus::Fulfilled {
            return self.mark_fulfilled(order_id, None).await;
        }

        let order = self.get_order(order_id).await?;
        let Some(record) = order.transition(to, self.clock.now())? else {
            return Ok(order);
        };

        self.store.commit(ChangeSet::new().update(record)).await?;

        metrics::counter!("storefront_order_transitions_total", "to" => to.as_str()).increment(1);
        tracing::debug!(%order_id, from = %order.status(), %to, "order status changed");
        self.get_order(order_id).await
    }

    /// Settles an order: stamps it fulfilled and books inventory and revenue
    /// on every product it contains, all in one commit.
    #[tracing::instrument(skip(self))]
    pub async fn mark_fulfilled(
        &self,
        order_id: OrderId,
        final_amount: Option<Money>,
    ) -> Result<Order, DomainError> {
        let order = self.get_order(order_id).await?;
        let products = self.order_products(&order).await?;

        let from = order.status();
        let fulfilment = order.fulfil(final_amount, &products, self.clock.now())?;
        let mut changes = ChangeSet::new().update(fulfilment.order);
        for product in fulfilment.products {
            changes = changes.update(product);
        }
        self.store.commit(changes).await?;

        record_fulfilled(order_id, from);
        self.get_order(order_id).await
    }

    /// Revises an open order and optionally moves it to a new status.
    ///
    /// Line changes, notes and the settled total are written in the same
    /// commit as the status change; a fulfillment books the revised lines.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn revise_order(&self, cmd: ReviseOrder) -> Result<Order, DomainError> {
        let order = self.get_order(cmd.order_id).await?;
        let now = self.clock.now();
        let revised = order.revise(&cmd, now)?;

        let mut changes = ChangeSet::new();
        let mut fulfilled = false;
        match cmd.status {
            Some(OrderStatus::Fulfilled) => {
                let products = self.order_products(&revised).await?;
                let fulfilment = revised.fulfil(None, &products, now)?;
                changes = changes.update(fulfilment.order);
                for product in fulfilment.products {
                    changes = changes.update(product);
                }
                fulfilled = true;
            }
            Some(to) => {
                let record = revised
                    .transition(to, now)?
                    .unwrap_or_else(|| revised.record().clone());
                changes = changes.update(record);
            }
            None => changes = changes.update(revised.record().clone()),
        }
        for item in revised.changed_items(&order) {
            changes = changes.update(item);
        }

        self.store.commit(changes).await?;

        if fulfilled {
            record_fulfilled(order.id(), order.status());
        } else if let Some(to) = cmd.status.filter(|to| *to != order.status()) {
            metrics::counter!("storefront_order_transitions_total", "to" => to.as_str())
                .increment(1);
            tracing::debug!(
                order_id = %order.id(),
                from = %order.status(),
                %to,
                "order status changed"
            );
        }
        tracing::debug!(order_id = %order.id(), items = cmd.items.len(), "order revised");
        self.get_order(order.id()).await
    }

    /// Loads an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let record = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        let items = self.store.order_items(order_id).await?;
        Ok(Order::new(record, items))
    }

    /// Looks up an order by the code a customer typed in.
    ///
    /// Input is trimmed and uppercased; codes with a bad length or checksum
    /// are rejected before touching storage.
    #[tracing::instrument(skip(self))]
    pub async fn track_order(&self, code: &str) -> Result<Order, DomainError> {
        let code = OrderCode::parse(code)?;
        let record = self
            .store
            .find_order_by_code(&code)
            .await?
            .ok_or_else(|| DomainError::not_found("order", &code))?;
        let items = self.store.order_items(record.id).await?;
        Ok(Order::new(record, items))
    }

    /// Lists order rows matching a query.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>, DomainError> {
        Ok(self.store.query_orders(query).await?)
    }

    async fn load_cart(&self, cmd: &Checkout) -> Result<Cart, DomainError> {
        let record = self
            .store
            .get_cart(cmd.cart_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart", cmd.cart_id))?;
        let items = self.store.cart_items(cmd.cart_id).await?;
        Ok(Cart::new(record, items))
    }

    async fn order_products(
        &self,
        order: &Order,
    ) -> Result<HashMap<ProductId, ProductRecord>, DomainError> {
        let mut products = HashMap::with_capacity(order.items().len());
        for item in order.items() {
            if products.contains_key(&item.product_id) {
                continue;
            }
            let product = self
                .store
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", item.product_id))?;
            products.insert(product.id, product);
        }
        Ok(products)
    }

    /// Tries fresh codes until one commits, up to the configured cap.
    async fn place_with_unique_code(
        &self,
        cart: &Cart,
        cmd: &Checkout,
        shop: &StoreRecord,
    ) -> Result<Order, DomainError> {
        let attempts = self.config.order_code_attempts;
        for _ in 0..attempts {
            let now = self.clock.now();
            let code = self.codes.generate(&shop.name, now);
            if self.store.order_code_exists(&code).await? {
                record_collision(&code);
                continue;
            }

            let (order, changes) = Order::place(cart, cmd, code, now)?;
            match self.store.commit(changes).await {
                Ok(()) => return Ok(order),
                // Taken between the check and the commit.
                Err(StorageError::UniqueViolation {
                    constraint: constraint::ORDER_CODE,
                    ..
                }) => record_collision(order.code()),
                Err(e) => return Err(e.into()),
            }
        }
        Err(ConflictError::OrderCodeSpaceExhausted { attempts }.into())
    }

    async fn dispatch_notification(
        &self,
        shop: &StoreRecord,
        order: &Order,
        products: &HashMap<ProductId, ProductRecord>,
    ) {
        let lines = order
            .items()
            .iter()
            .map(|item| {
                let name = products
                    .get(&item.product_id)
                    .map_or("unknown product", |p| p.name.as_str());
                format!("{}x {}", item.quantity, name)
            })
            .collect();

        let record = order.record();
        let notification = OrderNotification {
            store_id: shop.id,
            store_name: shop.name.clone(),
            store_email: shop.email.clone(),
            order_id: record.id,
            order_code: record.order_code.clone(),
            customer_name: record.customer_name.clone(),
            customer_phone: record.customer_phone.clone(),
            delivery_location: record.delivery_location.clone(),
            total_amount: record.total_amount,
            lines,
            placed_at: record.placed_at,
        };

        if let Err(e) = self.notifier.notify_order_created(&notification).await {
            metrics::counter!("storefront_notification_failures_total").increment(1);
            tracing::debug!(
                order_code = %notification.order_code,
                error = %e,
                "notifier rejected order"
            );
        }
    }
}

fn record_fulfilled(order_id: OrderId, from: OrderStatus) {
    metrics::counter!("storefront_orders_fulfilled_total").increment(1);
    metrics::counter!(
        "storefront_order_transitions_total",
        "to" => OrderStatus::Fulfilled.as_str()
    )
    .increment(1);
    tracing::debug!(%order_id, %from, "order fulfilled");
}

fn record_collision(code: &OrderCode) {
    metrics::counter!("storefront_order_code_collisions_total").increment(1);
    tracing::debug!(%code, "order code taken, retrying");
}

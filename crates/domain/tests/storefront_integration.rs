//! Integration tests for the storefront engine.
//!
//! These run the cart, order and reporting services together over the
//! in-memory store. Set `RUST_LOG=domain=debug` to see the spans.

use std::collections::HashSet;
use std::sync::{Arc, Once};

use chrono::{Duration, TimeZone, Utc};
use common::{Money, OrderStatus, ProductId, SessionKey, StoreId};
use domain::{
    CartService, CatalogService, Checkout, Clock, ConflictError, DomainError, EngineConfig,
    FixedClock, InMemoryNotifier, ItemRevision, LineItem, NewProduct, NewStore, Order,
    OrderService, ProductUpdate, ReportingService, ReviseOrder, SequenceRandom, ValidationError,
};
use storage::{InMemoryStorefrontStore, OrderQuery, StorefrontStore};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// Services wired over one store, with a clock fixed on 2024-10-18.
struct Storefront {
    store: InMemoryStorefrontStore,
    clock: Arc<FixedClock>,
    notifier: InMemoryNotifier,
    catalog: CatalogService<InMemoryStorefrontStore>,
    carts: CartService<InMemoryStorefrontStore>,
    orders: OrderService<InMemoryStorefrontStore, InMemoryNotifier>,
    reporting: ReportingService<InMemoryStorefrontStore>,
}

impl Storefront {
    fn new() -> Self {
        init_tracing();
        let store = InMemoryStorefrontStore::new();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 10, 18, 9, 30, 0).unwrap(),
        ));
        let notifier = InMemoryNotifier::new();
        Self {
            catalog: CatalogService::new(store.clone()).with_clock(clock.clone()),
            carts: CartService::new(store.clone()).with_clock(clock.clone()),
            orders: OrderService::new(store.clone(), notifier.clone()).with_clock(clock.clone()),
            reporting: ReportingService::new(store.clone()),
            store,
            clock,
            notifier,
        }
    }

    async fn shop(&self, name: &str) -> StoreId {
        self.catalog
            .register_store(NewStore {
                name: name.to_string(),
                owner: "owner-1".to_string(),
                email: "owner@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    async fn product(&self, store_id: StoreId, name: &str, cents: i64, inventory: u32) -> ProductId {
        self.catalog
            .add_product(
                store_id,
                NewProduct {
                    name: name.to_string(),
                    description: String::new(),
                    price: Money::from_cents(cents),
                    inventory,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn checkout(
        &self,
        session: &str,
        store_id: StoreId,
        lines: &[(ProductId, u32)],
    ) -> Result<Order, DomainError> {
        let cart = self
            .carts
            .get_or_create_cart(&SessionKey::new(session), store_id)
            .await?;
        for (product_id, quantity) in lines {
            self.carts.add_item(cart.id(), *product_id, *quantity).await?;
        }
        self.orders
            .create_from_cart(Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St"))
            .await
    }
}

fn matches_code_pattern(code: &str, prefix: &str) -> bool {
    let chars: Vec<char> = code.chars().collect();
    chars.len() == 8
        && code.starts_with(prefix)
        && chars[2..5].iter().all(|c| c.is_ascii_digit())
        && chars[5..]
            .iter()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
}

mod scenario {
    use super::*;

    #[tokio::test]
    async fn acme_checkout_and_fulfilment() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;

        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        let cart = sf.carts.add_item(cart.id(), p, 2).await.unwrap();
        assert_eq!(cart.total().unwrap(), Money::from_cents(1998));
        assert_eq!(cart.total().unwrap().to_string(), "19.98");

        let order = sf
            .orders
            .create_from_cart(Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St"))
            .await
            .unwrap();
        assert_eq!(order.total_amount(), Money::from_cents(1998));
        assert_eq!(order.status(), OrderStatus::Placed);
        assert!(matches_code_pattern(order.code().as_str(), "AC292"));
        assert!(sf.carts.get_cart(cart.id()).await.unwrap().is_empty());

        let order = sf.orders.mark_fulfilled(order.id(), None).await.unwrap();
        assert_eq!(order.final_total_amount(), Some(Money::from_cents(1998)));

        let product = sf.catalog.get_product(p).await.unwrap();
        assert_eq!(product.inventory, 8);
        assert_eq!(product.units_sold, 2);
        assert_eq!(product.total_revenue, Money::from_cents(1998));
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_session_and_store() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let other = sf.shop("Bolt").await;
        let session = SessionKey::new("s1");

        let first = sf.carts.get_or_create_cart(&session, acme).await.unwrap();
        let again = sf.carts.get_or_create_cart(&session, acme).await.unwrap();
        let elsewhere = sf.carts.get_or_create_cart(&session, other).await.unwrap();

        assert_eq!(first.id(), again.id());
        assert_ne!(first.id(), elsewhere.id());
        assert!(first.is_empty());
    }

    #[tokio::test]
    async fn merged_line_keeps_first_price() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();

        sf.carts.add_item(cart.id(), p, 2).await.unwrap();
        sf.catalog
            .update_product(
                p,
                ProductUpdate {
                    price: Some(Money::from_cents(1500)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let cart = sf.carts.add_item(cart.id(), p, 3).await.unwrap();

        assert_eq!(cart.item_count(), 1);
        let line = cart.item(p).unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(line.price, Money::from_cents(999));
        assert_eq!(cart.total().unwrap(), Money::from_cents(4995));
    }

    #[tokio::test]
    async fn quantity_updates_and_removal() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 250, 10).await;
        let q = sf.product(acme, "Q", 100, 10).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        sf.carts.add_item(cart.id(), p, 1).await.unwrap();
        sf.carts.add_item(cart.id(), q, 1).await.unwrap();

        let cart = sf.carts.update_quantity(cart.id(), p, 4).await.unwrap();
        assert_eq!(cart.item(p).unwrap().quantity, 4);
        assert_eq!(sf.carts.total(cart.id()).await.unwrap(), Money::from_cents(1100));

        let err = sf.carts.update_quantity(cart.id(), p, -1).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::InvalidQuantity { quantity: -1 })
        ));

        let cart = sf.carts.update_quantity(cart.id(), p, 0).await.unwrap();
        assert!(cart.item(p).is_none());

        let cart = sf.carts.remove_item(cart.id(), p).await.unwrap();
        assert_eq!(cart.item_count(), 1);

        let cart = sf.carts.clear(cart.id()).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total().unwrap(), Money::zero());
        assert!(sf.carts.find_cart(&SessionKey::new("s1"), acme).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn product_from_another_store_is_not_found() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let bolt = sf.shop("Bolt").await;
        let foreign = sf.product(bolt, "Bolt", 100, 10).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();

        let err = sf.carts.add_item(cart.id(), foreign, 1).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn concurrent_adds_lose_no_update() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 100, 100).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        sf.carts.add_item(cart.id(), p, 1).await.unwrap();

        let (a, b) = tokio::join!(
            sf.carts.add_item(cart.id(), p, 2),
            sf.carts.add_item(cart.id(), p, 3),
        );

        let mut expected = 1;
        for (result, quantity) in [(a, 2), (b, 3)] {
            match result {
                Ok(_) => expected += quantity,
                Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
            }
        }
        let cart = sf.carts.get_cart(cart.id()).await.unwrap();
        assert_eq!(cart.item(p).unwrap().quantity, expected);
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn lines_keep_cart_order() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let mut products = Vec::new();
        for name in ["Tea", "Bread", "Apples", "Cheese", "Dates"] {
            products.push(sf.product(acme, name, 300, 10).await);
        }
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        for (quantity, product_id) in (1u32..).zip(&products) {
            sf.clock.advance(Duration::seconds(1));
            sf.carts.add_item(cart.id(), *product_id, quantity).await.unwrap();
        }

        let order = sf
            .orders
            .create_from_cart(Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St"))
            .await
            .unwrap();

        let placed: Vec<ProductId> = order.items().iter().map(|i| i.product_id).collect();
        assert_eq!(placed, products);
        let reloaded = sf.orders.get_order(order.id()).await.unwrap();
        let stored: Vec<ProductId> = reloaded.items().iter().map(|i| i.product_id).collect();
        assert_eq!(stored, products);

        let sent = sf.notifier.sent().await;
        assert_eq!(
            sent[0].lines,
            vec!["1x Tea", "2x Bread", "3x Apples", "4x Cheese", "5x Dates"]
        );
    }

    #[tokio::test]
    async fn order_mirrors_cart_lines() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 1200, 10).await;
        let q = sf.product(acme, "Q", 600, 10).await;

        let order = sf.checkout("s1", acme, &[(p, 3), (q, 1)]).await.unwrap();

        assert_eq!(order.items().len(), 2);
        let line = order.items().iter().find(|i| i.product_id == p).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.price, Money::from_cents(1200));
        assert_eq!(line.final_price, None);
        assert_eq!(line.final_subtotal(), Ok(Money::from_cents(3600)));
        assert_eq!(order.total_amount(), Money::from_cents(4200));
        assert_eq!(order.placed_at(), sf.clock.now());

        assert_eq!(sf.store.cart_item_count().await, 0);
        assert_eq!(sf.store.order_item_count().await, 2);
    }

    #[tokio::test]
    async fn failed_commit_keeps_cart_and_writes_nothing() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        sf.carts.add_item(cart.id(), p, 2).await.unwrap();

        sf.store.fail_next_commit();
        let err = sf
            .orders
            .create_from_cart(Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St"))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Persistence(_)));
        assert_eq!(sf.store.order_count().await, 0);
        assert_eq!(sf.carts.get_cart(cart.id()).await.unwrap().item_count(), 1);
        assert_eq!(sf.notifier.sent_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_checkouts_of_one_cart_place_one_order() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        sf.carts.add_item(cart.id(), p, 2).await.unwrap();

        let cmd = Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St");
        let (a, b) = tokio::join!(
            sf.orders.create_from_cart(cmd.clone()),
            sf.orders.create_from_cart(cmd),
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(err.is_conflict() || err.is_validation(), "unexpected error: {err}");
        }
        assert_eq!(sf.store.order_count().await, 1);
        assert_eq!(sf.notifier.sent_count().await, 1);
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 1).await;

        let err = sf.checkout("s1", acme, &[]).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(ValidationError::EmptyCart)));

        let err = sf.checkout("s2", acme, &[(p, 2)]).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::InsufficientInventory {
                available: 1,
                requested: 2,
                ..
            })
        ));

        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s3"), acme)
            .await
            .unwrap();
        sf.carts.add_item(cart.id(), p, 1).await.unwrap();
        let err = sf
            .orders
            .create_from_cart(Checkout::new(cart.id(), "Jane", "", "1 Main St"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::MissingField("customer_phone"))
        ));

        assert_eq!(sf.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_checkout() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        sf.notifier.set_failing(true);

        let order = sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();

        assert_eq!(sf.orders.get_order(order.id()).await.unwrap().id(), order.id());
        assert_eq!(sf.notifier.sent_count().await, 0);

        sf.notifier.set_failing(false);
        sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();
        let sent = sf.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].lines, vec!["1x P".to_string()]);
    }
}

mod amounts {
    use super::*;

    #[tokio::test]
    async fn prices_above_the_cap_are_refused() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;

        let err = sf
            .catalog
            .add_product(
                acme,
                NewProduct {
                    name: "Gold".to_string(),
                    description: String::new(),
                    price: Money::from_cents(4_000_000_000_000_000_000),
                    inventory: 10,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::AmountOutOfRange { field: "price" })
        ));
        assert!(sf.catalog.list_products(acme).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overflowing_cart_lines_are_validation_errors() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let gold = sf.product(acme, "Gold", Money::MAX_AMOUNT.cents(), 10).await;
        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();

        let err = sf.carts.add_item(cart.id(), gold, u32::MAX).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::AmountOutOfRange { field: "subtotal" })
        ));
        assert!(sf.carts.get_cart(cart.id()).await.unwrap().is_empty());

        sf.carts.add_item(cart.id(), gold, 3).await.unwrap();
        assert_eq!(
            sf.carts.total(cart.id()).await.unwrap(),
            Money::from_cents(29_999_999_997)
        );
        let err = sf
            .carts
            .update_quantity(cart.id(), gold, i64::from(u32::MAX))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // The order total could not be recorded, so nothing is placed.
        let err = sf
            .orders
            .create_from_cart(Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::AmountOutOfRange {
                field: "total_amount"
            })
        ));
        assert_eq!(sf.store.order_count().await, 0);
        assert_eq!(sf.carts.get_cart(cart.id()).await.unwrap().total_quantity(), 3);
    }

    #[tokio::test]
    async fn oversized_revisions_leave_the_order_alone() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let order = sf.checkout("s1", acme, &[(p, 3)]).await.unwrap();
        let line = order.items()[0].id;

        let err = sf
            .orders
            .revise_order(
                ReviseOrder::new(order.id())
                    .item(ItemRevision::new(line).final_price(Money::from_cents(4_000_000_000_000_000_000))),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::AmountOutOfRange { field: "final_price" })
        ));

        let err = sf
            .orders
            .revise_order(ReviseOrder::new(order.id()).final_total_amount(Money::from_cents(i64::MAX)))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let stored = sf.orders.get_order(order.id()).await.unwrap();
        assert_eq!(stored.items()[0].final_price, None);
        assert_eq!(stored.final_total_amount(), None);

        let err = sf
            .orders
            .mark_fulfilled(order.id(), Some(Money::from_cents(i64::MAX)))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(sf.catalog.get_product(p).await.unwrap().inventory, 10);
    }
}

mod order_codes {
    use super::*;

    #[tokio::test]
    async fn a_thousand_orders_get_distinct_codes() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 100, 1_000).await;

        let mut codes = HashSet::new();
        for _ in 0..1_000 {
            let order = sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();
            assert!(matches_code_pattern(order.code().as_str(), "AC292"));
            codes.insert(order.code().clone());
        }
        assert_eq!(codes.len(), 1_000);
    }

    #[tokio::test]
    async fn exhausted_code_space_is_a_conflict() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 100, 10).await;
        let orders = OrderService::new(sf.store.clone(), sf.notifier.clone())
            .with_clock(sf.clock.clone())
            .with_random(Arc::new(SequenceRandom::new("Z9")))
            .with_config(EngineConfig::default().with_order_code_attempts(3));

        let cart = sf
            .carts
            .get_or_create_cart(&SessionKey::new("s1"), acme)
            .await
            .unwrap();
        sf.carts.add_item(cart.id(), p, 1).await.unwrap();
        let cmd = Checkout::new(cart.id(), "Jane", "555-1000", "1 Main St");
        let first = orders.create_from_cart(cmd.clone()).await.unwrap();
        assert_eq!(&first.code().as_str()[5..7], "Z9");

        sf.carts.add_item(cart.id(), p, 1).await.unwrap();
        let err = orders.create_from_cart(cmd).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Conflict(ConflictError::OrderCodeSpaceExhausted { attempts: 3 })
        ));
        assert_eq!(sf.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn short_store_names_use_what_they_have() {
        let sf = Storefront::new();
        let x = sf.shop("x").await;
        let p = sf.product(x, "P", 100, 10).await;

        let order = sf.checkout("s1", x, &[(p, 1)]).await.unwrap();
        assert_eq!(order.code().as_str().len(), 7);
        assert!(order.code().as_str().starts_with("X292"));
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn fulfilment_books_final_prices() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let a = sf.product(acme, "A", 1200, 10).await;
        let b = sf.product(acme, "B", 600, 10).await;
        let order = sf.checkout("s1", acme, &[(a, 3), (b, 1)]).await.unwrap();

        let line_a = order.items().iter().find(|i| i.product_id == a).unwrap().id;
        let line_b = order.items().iter().find(|i| i.product_id == b).unwrap().id;
        sf.orders
            .revise_order(
                ReviseOrder::new(order.id())
                    .item(ItemRevision::new(line_a).final_price(Money::from_cents(1000)))
                    .item(ItemRevision::new(line_b).final_price(Money::from_cents(500))),
            )
            .await
            .unwrap();

        let order = sf.orders.mark_fulfilled(order.id(), None).await.unwrap();
        assert_eq!(order.final_total_amount(), Some(Money::from_cents(3500)));
        assert_eq!(order.total_amount(), Money::from_cents(4200));

        let a = sf.catalog.get_product(a).await.unwrap();
        assert_eq!((a.inventory, a.units_sold), (7, 3));
        assert_eq!(a.total_revenue, Money::from_cents(3000));
        let b = sf.catalog.get_product(b).await.unwrap();
        assert_eq!((b.inventory, b.units_sold), (9, 1));
        assert_eq!(b.total_revenue, Money::from_cents(500));
    }

    #[tokio::test]
    async fn explicit_final_amount_wins() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let order = sf.checkout("s1", acme, &[(p, 2)]).await.unwrap();

        let order = sf
            .orders
            .mark_fulfilled(order.id(), Some(Money::from_cents(1800)))
            .await
            .unwrap();
        assert_eq!(order.final_total_amount(), Some(Money::from_cents(1800)));
        assert_eq!(order.fulfilled_at(), Some(sf.clock.now()));
    }

    #[tokio::test]
    async fn transitions_follow_the_table() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let order = sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();

        let order = sf
            .orders
            .transition(order.id(), OrderStatus::InDelivery)
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::InDelivery);

        let err = sf
            .orders
            .transition(order.id(), OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::IllegalTransition {
                from: OrderStatus::InDelivery,
                to: OrderStatus::Confirmed,
            })
        ));

        let order = sf
            .orders
            .transition(order.id(), OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);

        let err = sf.orders.mark_fulfilled(order.id(), None).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(sf.catalog.get_product(p).await.unwrap().inventory, 10);
    }

    #[tokio::test]
    async fn fulfilment_never_drives_inventory_negative() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 5).await;
        let first = sf.checkout("s1", acme, &[(p, 4)]).await.unwrap();
        let second = sf.checkout("s2", acme, &[(p, 4)]).await.unwrap();

        sf.orders.mark_fulfilled(first.id(), None).await.unwrap();
        let err = sf.orders.mark_fulfilled(second.id(), None).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::InsufficientInventory { .. })
        ));

        assert_eq!(sf.catalog.get_product(p).await.unwrap().inventory, 1);
        let second = sf.orders.get_order(second.id()).await.unwrap();
        assert_eq!(second.status(), OrderStatus::Placed);
    }

    #[tokio::test]
    async fn closed_orders_cannot_be_revised() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let order = sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();
        sf.orders
            .transition(order.id(), OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = sf
            .orders
            .revise_order(ReviseOrder::new(order.id()).notes("too late"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::OrderClosed {
                status: OrderStatus::Cancelled
            })
        ));
    }

    #[tokio::test]
    async fn orders_can_be_tracked_and_listed() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 999, 10).await;
        let placed = sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();
        let done = sf.checkout("s2", acme, &[(p, 1)]).await.unwrap();
        sf.orders.mark_fulfilled(done.id(), None).await.unwrap();

        let tracked = sf.orders.track_order(placed.code().as_str()).await.unwrap();
        assert_eq!(tracked.id(), placed.id());

        let open = sf
            .orders
            .list_orders(OrderQuery::for_store(acme).exclude_status(OrderStatus::Fulfilled))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, placed.id());
    }
}

mod reporting {
    use super::*;

    #[tokio::test]
    async fn pending_counts_cancelled_orders() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 1000, 10).await;

        let _placed = sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();
        let confirmed = sf.checkout("s2", acme, &[(p, 1)]).await.unwrap();
        let fulfilled = sf.checkout("s3", acme, &[(p, 2)]).await.unwrap();
        let cancelled = sf.checkout("s4", acme, &[(p, 1)]).await.unwrap();

        sf.orders
            .transition(confirmed.id(), OrderStatus::Confirmed)
            .await
            .unwrap();
        sf.orders.mark_fulfilled(fulfilled.id(), None).await.unwrap();
        sf.orders
            .transition(cancelled.id(), OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(sf.reporting.total_orders(acme).await.unwrap(), 4);
        assert_eq!(sf.reporting.pending_orders(acme).await.unwrap(), 3);
        assert_eq!(
            sf.reporting.total_revenue(acme).await.unwrap(),
            Money::from_cents(2000)
        );
        let summary = sf.reporting.summary(acme).await.unwrap();
        assert_eq!(summary.total_orders, 4);
        assert_eq!(summary.pending_orders, 3);
    }

    #[tokio::test]
    async fn deleting_a_store_removes_its_orders() {
        let sf = Storefront::new();
        let acme = sf.shop("Acme").await;
        let p = sf.product(acme, "P", 1000, 10).await;
        sf.checkout("s1", acme, &[(p, 1)]).await.unwrap();

        sf.catalog.delete_store(acme).await.unwrap();

        assert_eq!(sf.store.order_count().await, 0);
        assert!(sf.store.get_store(acme).await.unwrap().is_none());
        assert!(matches!(
            sf.reporting.total_orders(acme).await.unwrap_err(),
            DomainError::NotFound { entity: "store", .. }
        ));
    }
}

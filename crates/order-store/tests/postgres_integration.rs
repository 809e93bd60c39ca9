//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{
    AddressId, CartId, DiscountPercent, Money, OrderId, OrderItemId, OrderItemStatus, PaymentId,
    PaymentMode, PaymentStatus, ProductId, PromoId, SlotId, TrackingEventId, TrackingId, UserId,
};
use futures_util::TryStreamExt;
use order_store::{
    AddressRecord, CartLine, OrderItemRecord, OrderRecord, PaymentRecord, PostgresStore,
    ProductRecord, PromoRecord, SlotRecord, Store, StoreError, StoreTx, TrackingEventRecord,
    TrackingRecord,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_fulfillment_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE tracking_events, tracking_records, order_items, orders, payments, \
         cart_items, carts, promo_codes, addresses, inventory_slots, products",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

struct Seeded {
    merchant: UserId,
    buyer: UserId,
    product: ProductId,
    slot: SlotId,
    address: AddressId,
}

async fn seed(store: &PostgresStore, stock: u32) -> Seeded {
    let merchant = UserId::new();
    let buyer = UserId::new();
    let product = ProductId::new();
    let slot = SlotId::new();
    let address = AddressId::new();

    store
        .put_product(ProductRecord {
            id: product,
            merchant_id: merchant,
            name: "Trail Runner".to_string(),
            price: Money::from_dollars(100),
            discount: None,
            image_key: Some("products/trail-runner.png".to_string()),
        })
        .await
        .unwrap();
    store
        .put_slot(SlotRecord {
            id: slot,
            product_id: product,
            size: 42.0,
            quantity: stock,
        })
        .await
        .unwrap();
    store
        .put_address(AddressRecord {
            id: address,
            buyer_id: buyer,
        })
        .await
        .unwrap();

    Seeded {
        merchant,
        buyer,
        product,
        slot,
        address,
    }
}

/// Writes one order with a single item and its tracking record at stage 0.
async fn place_order(store: &PostgresStore, seeded: &Seeded) -> (OrderId, OrderItemId, TrackingId) {
    let now = Utc::now();
    let payment = PaymentRecord {
        id: PaymentId::new(),
        amount: Money::from_dollars(100),
        mode: PaymentMode::Prepaid,
        status: PaymentStatus::Completed,
        transaction_id: Some("txn-1".to_string()),
        created_at: now,
    };
    let order = OrderRecord {
        id: OrderId::new(),
        buyer_id: seeded.buyer,
        payment_id: payment.id,
        address_id: seeded.address,
        promo_id: None,
        amount: Money::from_dollars(100),
        created_at: now,
        updated_at: now,
    };
    let item = OrderItemRecord {
        id: OrderItemId::new(),
        order_id: order.id,
        product_id: seeded.product,
        size: 42.0,
        quantity: 1,
        amount: Money::from_dollars(100),
        status: OrderItemStatus::Active,
        created_at: now,
        updated_at: now,
    };
    let tracking = TrackingRecord {
        id: TrackingId::new(),
        order_item_id: item.id,
        stage: 0,
        created_at: now,
        updated_at: now,
    };

    let mut tx = store.begin().await.unwrap();
    tx.insert_payment(&payment).await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.insert_order_item(&item).await.unwrap();
    tx.insert_tracking_record(&tracking).await.unwrap();
    tx.append_tracking_event(&TrackingEventRecord {
        id: TrackingEventId::new(),
        tracking_id: tracking.id,
        stage: 0,
        title: "Order Processed".to_string(),
        summary: "Your Order is being processed".to_string(),
        created_at: now,
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    (order.id, item.id, tracking.id)
}

#[tokio::test]
async fn reference_rows_round_trip() {
    let store = get_test_store().await;
    let seeded = seed(&store, 5).await;

    let product = store.product(seeded.product).await.unwrap().unwrap();
    assert_eq!(product.merchant_id, seeded.merchant);
    assert_eq!(product.price, Money::from_dollars(100));

    let slot = store.find_slot(seeded.product, 42.0).await.unwrap().unwrap();
    assert_eq!(slot.id, seeded.slot);
    assert_eq!(slot.quantity, 5);

    assert!(store.find_slot(seeded.product, 43.0).await.unwrap().is_none());
}

#[tokio::test]
async fn promo_discount_is_read_inside_transaction() {
    let store = get_test_store().await;
    let promo = PromoRecord {
        id: PromoId::new(),
        code: "SPRING10".to_string(),
        discount: DiscountPercent::from_percent(10).unwrap(),
    };
    store.put_promo(promo.clone()).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.promo(promo.id).await.unwrap(), Some(promo));
    assert!(tx.promo(PromoId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn cart_lines_accumulate_running_total() {
    let store = get_test_store().await;
    let seeded = seed(&store, 5).await;

    let line = CartLine {
        product_id: seeded.product,
        slot_id: seeded.slot,
        quantity: 2,
        unit_price: Money::from_dollars(30),
    };
    let first = store.add_cart_line(seeded.buyer, line.clone()).await.unwrap();
    assert_eq!(first.total, Money::from_dollars(60));

    let second = store.add_cart_line(seeded.buyer, line).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.total, Money::from_dollars(120));

    let items = store.cart_items(first.id).await.unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn decrement_guards_against_negative_stock() {
    let store = get_test_store().await;
    let seeded = seed(&store, 3).await;

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.decrement_inventory(seeded.slot, 2).await.unwrap(), 1);

    let err = tx.decrement_inventory(seeded.slot, 2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientInventory {
            requested: 2,
            available: 1,
            ..
        }
    ));
    tx.commit().await.unwrap();

    let slot = store.slot(seeded.slot).await.unwrap().unwrap();
    assert_eq!(slot.quantity, 1);
}

#[tokio::test]
async fn decrement_unknown_slot_is_not_found() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let err = tx.decrement_inventory(SlotId::new(), 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn concurrent_decrements_never_oversell() {
    let store = Arc::new(get_test_store().await);
    let seeded = seed(&store, 1).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let slot = seeded.slot;
        handles.push(tokio::spawn(async move {
            let mut tx = store.begin().await?;
            tx.decrement_inventory(slot, 1).await?;
            tx.commit().await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => succeeded += 1,
            Err(StoreError::InsufficientInventory { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 1);
    let slot = store.slot(seeded.slot).await.unwrap().unwrap();
    assert_eq!(slot.quantity, 0);
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let store = get_test_store().await;
    let seeded = seed(&store, 3).await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.decrement_inventory(seeded.slot, 3).await.unwrap();
        tx.insert_payment(&PaymentRecord {
            id: PaymentId::new(),
            amount: Money::from_dollars(10),
            mode: PaymentMode::CashOnDelivery,
            status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    }

    let slot = store.slot(seeded.slot).await.unwrap().unwrap();
    assert_eq!(slot.quantity, 3);

    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(payments, 0);
}

#[tokio::test]
async fn deleting_cart_removes_its_items() {
    let store = get_test_store().await;
    let seeded = seed(&store, 3).await;

    let cart = store
        .add_cart_line(
            seeded.buyer,
            CartLine {
                product_id: seeded.product,
                slot_id: seeded.slot,
                quantity: 1,
                unit_price: Money::from_dollars(100),
            },
        )
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.lock_cart(cart.id).await.unwrap().is_some());
    tx.delete_cart(cart.id).await.unwrap();
    tx.commit().await.unwrap();

    assert!(store.cart_for_buyer(seeded.buyer).await.unwrap().is_none());
    assert!(store.cart_items(cart.id).await.unwrap().is_empty());

    let mut tx = store.begin().await.unwrap();
    let err = tx.delete_cart(CartId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn order_listings_filter_by_owner_and_status() {
    let store = get_test_store().await;
    let seeded = seed(&store, 3).await;
    let (order_id, item_id, _) = place_order(&store, &seeded).await;

    assert_eq!(store.count_orders_for_buyer(seeded.buyer).await.unwrap(), 1);
    assert_eq!(store.count_orders_for_buyer(UserId::new()).await.unwrap(), 0);

    let buyer_items = store
        .buyer_order_items(seeded.buyer, OrderItemStatus::Active)
        .await
        .unwrap();
    assert_eq!(buyer_items.len(), 1);
    assert_eq!(buyer_items[0].order_id, order_id);
    assert_eq!(buyer_items[0].product_name, "Trail Runner");

    let merchant_items = store
        .merchant_order_items(seeded.merchant, OrderItemStatus::Active)
        .await
        .unwrap();
    assert_eq!(merchant_items.len(), 1);
    assert_eq!(merchant_items[0].order_item_id, item_id);

    assert!(
        store
            .merchant_order_items(UserId::new(), OrderItemStatus::Active)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        store
            .buyer_order_items(seeded.buyer, OrderItemStatus::Completed)
            .await
            .unwrap()
            .is_empty()
    );

    assert_eq!(
        store.order_item_merchant(item_id).await.unwrap(),
        Some(seeded.merchant)
    );
}

#[tokio::test]
async fn tracking_updates_and_history_stream() {
    let store = get_test_store().await;
    let seeded = seed(&store, 3).await;
    let (_, item_id, tracking_id) = place_order(&store, &seeded).await;

    let now = Utc::now();
    let mut tx = store.begin().await.unwrap();
    let locked = tx.lock_tracking_record(item_id).await.unwrap().unwrap();
    assert_eq!(locked.stage, 0);
    tx.update_tracking_stage(tracking_id, 1, now).await.unwrap();
    tx.append_tracking_event(&TrackingEventRecord {
        id: TrackingEventId::new(),
        tracking_id,
        stage: 1,
        title: "Order Shipped".to_string(),
        summary: "Your Order is Shipped".to_string(),
        created_at: now,
    })
    .await
    .unwrap();
    tx.update_order_item_status(item_id, OrderItemStatus::Completed, now)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let record = store.tracking_record(item_id).await.unwrap().unwrap();
    assert_eq!(record.stage, 1);
    let item = store.order_item(item_id).await.unwrap().unwrap();
    assert_eq!(item.status, OrderItemStatus::Completed);

    let events: Vec<_> = store
        .stream_tracking_events(item_id)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let stages: Vec<i16> = events.iter().map(|e| e.stage).collect();
    assert_eq!(stages, vec![0, 1]);

    let err = match store.stream_tracking_events(OrderItemId::new()).await {
        Err(e) => e,
        Ok(_) => panic!("expected missing tracking record"),
    };
    assert!(matches!(err, StoreError::NotFound { .. }));
}

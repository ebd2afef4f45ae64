//! Integration tests for the sale fulfillment flow against a real SQLite database.
use std::{
    pin::Pin,
    sync::{Arc, Mutex},
};

use q2b_common::Money;
use qr2buy_engine::{
    db_types::{ItemStatus, NewDevice, NewOrder, NewProduct, PaymentReceipt},
    events::{EventHandlers, EventHooks, EventProducers, SaleCompletedEvent},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{CatalogManagement, StorefrontError},
    FulfillmentApi,
    SqliteDatabase,
};
use serde_json::json;

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn api(db: &SqliteDatabase) -> FulfillmentApi<SqliteDatabase> {
    FulfillmentApi::new(db.clone(), EventProducers::default())
}

async fn seed_linked_pair(db: &SqliteDatabase) -> (i64, i64) {
    let product = db
        .create_product(NewProduct::new("Vintage lamp", Money::from(1999)).with_short_id("ab12cd"))
        .await
        .expect("create product");
    let device = db.create_device(NewDevice::new("ESP32-DEMO-001")).await.expect("create device");
    db.link_device_to_product(device.id, product.id).await.expect("link");
    (product.id, device.id)
}

#[tokio::test]
async fn resolving_a_sale_twice_writes_once() {
    let db = new_db().await;
    let (product_id, _) = seed_linked_pair(&db).await;
    let api = api(&db);

    let first = api.resolve_sale(product_id, None).await.expect("first resolution");
    assert_eq!(first.product.status, ItemStatus::Sold);
    assert!(first.state_changed);
    let device = first.device.expect("device resolved through product link");
    assert_eq!(device.status, ItemStatus::Sold);

    let second = api.resolve_sale(product_id, None).await.expect("second resolution");
    assert_eq!(second.product.status, ItemStatus::Sold);
    assert!(!second.state_changed, "retry must not persist another write");
    assert_eq!(second.product.updated_at, first.product.updated_at);
}

#[tokio::test]
async fn unknown_product_is_reported_as_not_found() {
    let db = new_db().await;
    let api = api(&db);
    let err = api.resolve_sale(9999, None).await.expect_err("expected NotFound");
    assert!(matches!(err, StorefrontError::ProductNotFound(_)));
}

#[tokio::test]
async fn device_hint_takes_precedence_over_product_link() {
    let db = new_db().await;
    let (product_id, linked_device_id) = seed_linked_pair(&db).await;
    let other = db.create_device(NewDevice::new("ESP32-OTHER-002")).await.expect("create device");

    let api = api(&db);
    let result = api.resolve_sale(product_id, Some("ESP32-OTHER-002")).await.expect("resolution");
    assert_eq!(result.device.as_ref().map(|d| d.id), Some(other.id));
    assert_eq!(result.device.unwrap().status, ItemStatus::Sold);

    let linked = db.fetch_device_by_id(linked_device_id).await.expect("fetch").expect("exists");
    assert_eq!(linked.status, ItemStatus::Available, "linked device untouched when the hint resolves");
}

#[tokio::test]
async fn sale_proceeds_without_a_display() {
    let db = new_db().await;
    let product =
        db.create_product(NewProduct::new("Orphan item", Money::from(500)).with_short_id("xx99yy")).await.expect("create");
    let api = api(&db);
    let result = api.resolve_sale(product.id, Some("never-seen-device")).await.expect("resolution");
    assert_eq!(result.product.status, ItemStatus::Sold);
    assert!(result.device.is_none());
}

#[tokio::test]
async fn order_upsert_is_keyed_by_session_id() {
    let db = new_db().await;
    let (product_id, _) = seed_linked_pair(&db).await;
    let api = api(&db);

    let mut order = NewOrder::new("cs_test_123", product_id, Money::from(1999));
    order.raw = json!({"attempt": 1});
    let first = api.upsert_order(order.clone()).await.expect("insert");

    order.amount = Money::from(2499);
    order.status = "checkout.session.completed".to_string();
    order.raw = json!({"attempt": 2});
    let second = api.upsert_order(order).await.expect("update");

    assert_eq!(first.id, second.id, "same row must be updated, never duplicated");
    assert_eq!(second.amount, Money::from(2499));
    assert_eq!(second.status, "checkout.session.completed");

    let fetched = api.fetch_order_by_session_id("cs_test_123").await.expect("fetch").expect("exists");
    assert_eq!(fetched.id, first.id);
    assert_eq!(fetched.raw.0, json!({"attempt": 2}));
}

#[tokio::test]
async fn confirm_sale_happy_path_fires_hook() {
    let db = new_db().await;
    let (product_id, device_id) = seed_linked_pair(&db).await;

    let seen: Arc<Mutex<Vec<SaleCompletedEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut hooks = EventHooks::default();
    hooks.on_sale_completed(move |ev| {
        let sink = sink.clone();
        Box::pin(async move {
            sink.lock().unwrap().push(ev);
        }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let api = FulfillmentApi::new(db.clone(), handlers.producers());
    handlers.start_handlers().await;

    let receipt = PaymentReceipt {
        session_id: "cs_test_happy".to_string(),
        payment_intent_id: Some("pi_123".to_string()),
        status: "paid".to_string(),
        amount: Money::from(1999),
        currency: "EUR".to_string(),
        raw: json!({"id": "cs_test_happy", "payment_status": "paid"}),
    };
    let confirmation = api.confirm_sale(product_id, Some("ESP32-DEMO-001"), receipt).await.expect("confirmation");

    assert_eq!(confirmation.product.status, ItemStatus::Sold);
    assert_eq!(confirmation.device.as_ref().map(|d| d.id), Some(device_id));
    assert_eq!(confirmation.order.session_id, "cs_test_happy");
    assert_eq!(confirmation.order.device_id, Some(device_id));

    // The hook runs on its own task; give it a beat.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].order.session_id, "cs_test_happy");
}

#[tokio::test]
async fn racing_confirmations_for_one_session_yield_one_order() {
    let db = new_db().await;
    let (product_id, _) = seed_linked_pair(&db).await;

    let make_receipt = || PaymentReceipt {
        session_id: "cs_test_race".to_string(),
        payment_intent_id: None,
        status: "paid".to_string(),
        amount: Money::from(1999),
        currency: "EUR".to_string(),
        raw: json!({}),
    };
    let api_a = FulfillmentApi::new(db.clone(), EventProducers::default());
    let api_b = FulfillmentApi::new(db.clone(), EventProducers::default());
    let (a, b) = tokio::join!(
        api_a.confirm_sale(product_id, None, make_receipt()),
        api_b.confirm_sale(product_id, None, make_receipt()),
    );
    let a = a.expect("first racer must not see an error");
    let b = b.expect("second racer must not see an error");
    assert_eq!(a.order.id, b.order.id, "both racers must land on the same order row");
    assert_eq!(a.product.status, ItemStatus::Sold);
    assert_eq!(b.product.status, ItemStatus::Sold);
}

//! Tests for the confirm flow shared by both gateway paths, driven directly so no provider network I/O is needed.
use q2b_common::Money;
use qr2buy_engine::{db_types::ItemStatus, events::EventProducers, FulfillmentApi};
use serde_json::json;
use stripe_tools::CheckoutSession;

use crate::{
    endpoint_tests::mocks::{device_fixture, order_fixture, product_fixture, MockStorefront},
    errors::ServerError,
    integrations::stripe::{confirm_checkout_session, receipt_from_session},
};

fn session_from(value: serde_json::Value) -> CheckoutSession {
    serde_json::from_value(value).expect("valid session")
}

#[actix_web::test]
async fn missing_product_metadata_is_a_bad_request_with_no_mutation() {
    let _ = env_logger::try_init().ok();
    // No expectations: the helper must bail before touching storage.
    let api = FulfillmentApi::new(MockStorefront::new(), EventProducers::default());
    let session = session_from(json!({"id": "cs_outside", "payment_status": "paid"}));
    let err = confirm_checkout_session(&session, &api).await.expect_err("expected BadRequest");
    assert!(matches!(err, ServerError::BadRequest(_)));
}

#[actix_web::test]
async fn garbled_product_metadata_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let api = FulfillmentApi::new(MockStorefront::new(), EventProducers::default());
    let session = session_from(json!({
        "id": "cs_bad",
        "payment_status": "paid",
        "metadata": {"product_id": "not-a-number"}
    }));
    let err = confirm_checkout_session(&session, &api).await.expect_err("expected BadRequest");
    assert!(matches!(err, ServerError::BadRequest(_)));
}

#[actix_web::test]
async fn confirm_resolves_sale_and_records_the_receipt() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockStorefront::new();
    mock.expect_fetch_product_by_id().returning(|id| Ok(Some(product_fixture(id, ItemStatus::Available))));
    mock.expect_set_product_status().returning(|id, status| Ok((product_fixture(id, status), true)));
    mock.expect_fetch_device_by_device_id()
        .returning(|device_id| Ok(Some(device_fixture(3, device_id, ItemStatus::Available))));
    mock.expect_set_device_status()
        .returning(|id, status| Ok((device_fixture(id, "ESP32-DEMO-001", status), true)));
    mock.expect_upsert_order().returning(|order| Ok(order_fixture(&order)));

    let api = FulfillmentApi::new(mock, EventProducers::default());
    let session = session_from(json!({
        "id": "cs_confirm",
        "payment_status": "paid",
        "currency": "eur",
        "amount_total": 1999,
        "payment_intent": {"id": "pi_1", "status": "succeeded"},
        "metadata": {"product_id": "42", "device_id": "ESP32-DEMO-001"}
    }));
    let confirmation = confirm_checkout_session(&session, &api).await.expect("confirmation");
    assert_eq!(confirmation.product.status, ItemStatus::Sold);
    assert_eq!(confirmation.device.expect("device").status, ItemStatus::Sold);
    assert_eq!(confirmation.order.session_id, "cs_confirm");
    assert_eq!(confirmation.order.amount, Money::from(1999));
    assert_eq!(confirmation.order.currency, "EUR");
    assert_eq!(confirmation.order.payment_intent_id.as_deref(), Some("pi_1"));
}

#[actix_web::test]
async fn receipts_carry_minor_units_and_uppercased_currency() {
    let session = session_from(json!({
        "id": "cs_receipt",
        "status": "complete",
        "currency": "eur",
        "amount_total": 2499,
    }));
    let receipt = receipt_from_session(&session);
    assert_eq!(receipt.amount, Money::from(2499));
    assert_eq!(receipt.currency, "EUR");
    assert_eq!(receipt.status, "complete");
    assert_eq!(receipt.payment_intent_id, None);
    assert_eq!(receipt.raw["id"], "cs_receipt");
}

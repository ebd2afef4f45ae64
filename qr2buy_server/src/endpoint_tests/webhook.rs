use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use hmac::{Hmac, Mac};
use q2b_common::Secret;
use qr2buy_engine::{db_types::ItemStatus, events::EventProducers, FulfillmentApi};
use serde_json::json;
use sha2::Sha256;
use stripe_tools::{StripeApi, StripeConfig, SIGNATURE_HEADER};

use crate::{
    config::ServerOptions,
    endpoint_tests::{
        helpers::post_bytes,
        mocks::{device_fixture, order_fixture, product_fixture, MockStorefront},
    },
    stripe_routes::StripeWebhookRoute,
};

const WEBHOOK_SECRET: &str = "whsec_endpoint_test";

fn sign(payload: &[u8], secret: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn completed_event_payload() -> Vec<u8> {
    json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_hook",
                "payment_status": "paid",
                "currency": "eur",
                "amount_total": 1999,
                "payment_intent": "pi_hook",
                "metadata": {"product_id": "42", "device_id": "ESP32-DEMO-001"}
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn configure_with(
    mock: MockStorefront,
    webhook_secret: Option<&str>,
    production: bool,
) -> impl FnOnce(&mut ServiceConfig) {
    let stripe_config = StripeConfig {
        secret_key: Secret::new("sk_test".to_string()),
        webhook_secret: webhook_secret.map(|s| Secret::new(s.to_string())),
        api_base: "http://localhost:0".to_string(),
    };
    move |cfg: &mut ServiceConfig| {
        cfg.service(StripeWebhookRoute::<MockStorefront>::new())
            .app_data(web::Data::new(FulfillmentApi::new(mock, EventProducers::default())))
            .app_data(web::Data::new(StripeApi::new(stripe_config).expect("stripe api")))
            .app_data(web::Data::new(ServerOptions {
                production,
                public_base_url: "https://shop.example.com".to_string(),
            }));
    }
}

#[actix_web::test]
async fn signed_completed_event_fulfills_the_sale() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockStorefront::new();
    mock.expect_fetch_product_by_id()
        .times(1)
        .returning(|id| Ok(Some(product_fixture(id, ItemStatus::Available))));
    mock.expect_set_product_status()
        .times(1)
        .returning(|id, status| Ok((product_fixture(id, status), true)));
    mock.expect_fetch_device_by_device_id()
        .times(1)
        .returning(|device_id| Ok(Some(device_fixture(7, device_id, ItemStatus::Available))));
    mock.expect_set_device_status()
        .times(1)
        .returning(|id, status| Ok((device_fixture(id, "ESP32-DEMO-001", status), true)));
    mock.expect_upsert_order().times(1).returning(|order| {
        assert_eq!(order.session_id, "cs_test_hook");
        assert_eq!(order.product_id, 42);
        assert_eq!(order.device_id, Some(7));
        assert_eq!(order.amount.value(), 1999);
        assert_eq!(order.currency, "EUR");
        Ok(order_fixture(&order))
    });

    let payload = completed_event_payload();
    let signature = sign(&payload, WEBHOOK_SECRET);
    let (status, body) = post_bytes(
        "/webhook",
        &[(SIGNATURE_HEADER, signature.as_str())],
        payload,
        configure_with(mock, Some(WEBHOOK_SECRET), false),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"received\":true"));
}

#[actix_web::test]
async fn invalid_signature_is_rejected_and_nothing_is_mutated() {
    let _ = env_logger::try_init().ok();
    // No expectations: any storage call would panic the test.
    let mock = MockStorefront::new();
    let payload = completed_event_payload();
    let signature = sign(&payload, "whsec_wrong");
    let (status, _) = post_bytes(
        "/webhook",
        &[(SIGNATURE_HEADER, signature.as_str())],
        payload,
        configure_with(mock, Some(WEBHOOK_SECRET), false),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn missing_signature_header_is_rejected() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_bytes(
        "/webhook",
        &[],
        completed_event_payload(),
        configure_with(MockStorefront::new(), Some(WEBHOOK_SECRET), false),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn missing_secret_in_production_fails_closed() {
    let _ = env_logger::try_init().ok();
    let (status, _) = post_bytes(
        "/webhook",
        &[],
        completed_event_payload(),
        configure_with(MockStorefront::new(), None, true),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn unknown_event_types_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let payload = json!({
        "id": "evt_other",
        "type": "invoice.finalized",
        "data": {"object": {}}
    })
    .to_string()
    .into_bytes();
    let signature = sign(&payload, WEBHOOK_SECRET);
    let (status, body) = post_bytes(
        "/webhook",
        &[(SIGNATURE_HEADER, signature.as_str())],
        payload,
        configure_with(MockStorefront::new(), Some(WEBHOOK_SECRET), false),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"received\":true"));
}

#[actix_web::test]
async fn session_without_product_metadata_is_acknowledged_without_mutation() {
    let _ = env_logger::try_init().ok();
    let payload = json!({
        "id": "evt_no_meta",
        "type": "checkout.session.completed",
        "data": {"object": {"id": "cs_foreign", "payment_status": "paid"}}
    })
    .to_string()
    .into_bytes();
    let signature = sign(&payload, WEBHOOK_SECRET);
    let (status, body) = post_bytes(
        "/webhook",
        &[(SIGNATURE_HEADER, signature.as_str())],
        payload,
        configure_with(MockStorefront::new(), Some(WEBHOOK_SECRET), false),
    )
    .await;
    // Acknowledged so the provider does not redeliver an event that can never succeed.
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"success\":false"));
}

use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Utc;
use qr2buy_engine::{
    db_types::{DisplayState, ItemStatus},
    events::EventProducers,
    CatalogApi,
    DeviceConfigApi,
};
use serde_json::Value;

use crate::{
    endpoint_tests::{
        helpers::get_request,
        mocks::{device_fixture, MockStorefront},
    },
    routes::{DisplayConfigRoute, PublicProductByShortRoute},
};

const BASE_URL: &str = "https://shop.example.com";

fn configure_with(mock: MockStorefront, catalog_mock: MockStorefront) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.service(DisplayConfigRoute::<MockStorefront>::new())
            .service(PublicProductByShortRoute::<MockStorefront>::new())
            .app_data(web::Data::new(DeviceConfigApi::new(mock, BASE_URL)))
            .app_data(web::Data::new(CatalogApi::new(catalog_mock, EventProducers::default())));
    }
}

#[actix_web::test]
async fn unseen_device_is_auto_provisioned_with_defaults() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockStorefront::new();
    mock.expect_fetch_or_create_device()
        .times(1)
        .returning(|id| Ok(device_fixture(1, id, ItemStatus::Available)));
    mock.expect_touch_device_last_seen()
        .times(1)
        .returning(|id| Ok(device_fixture(1, id, ItemStatus::Available)));

    let (status, body) =
        get_request("/config?deviceId=ESP32-NEW-001", &[], configure_with(mock, MockStorefront::new())).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("valid json");
    assert_eq!(json["deviceId"], "ESP32-NEW-001");
    assert_eq!(json["status"], "AVAILABLE");
    assert_eq!(json["text"], "Buy now");
    assert_eq!(json["qrTarget"], Value::Null);
    assert!(json["version"].is_i64());
}

#[actix_web::test]
async fn configured_secret_rejects_wrong_and_absent_credentials() {
    let _ = env_logger::try_init().ok();
    fn secured() -> qr2buy_engine::db_types::Device {
        let mut device = device_fixture(2, "ESP32-SECRET", ItemStatus::Available);
        device.device_secret = Some("s3cret".to_string());
        device
    }
    let mut mock = MockStorefront::new();
    mock.expect_fetch_or_create_device().returning(|_| Ok(secured()));
    mock.expect_touch_device_last_seen().returning(|_| Ok(secured()));

    let (status, _) = get_request(
        "/config?deviceId=ESP32-SECRET",
        &[("x-device-secret", "wrong")],
        configure_with(mock, MockStorefront::new()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut mock = MockStorefront::new();
    mock.expect_fetch_or_create_device().returning(|_| Ok(secured()));
    mock.expect_touch_device_last_seen().returning(|_| Ok(secured()));
    let (status, _) =
        get_request("/config?deviceId=ESP32-SECRET", &[], configure_with(mock, MockStorefront::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn config_without_device_id_serves_the_legacy_state() {
    let _ = env_logger::try_init().ok();
    let mut catalog_mock = MockStorefront::new();
    catalog_mock.expect_fetch_display_state().times(1).returning(|| {
        Ok(DisplayState { id: 1, text: "Buy now".to_string(), qr: None, version: 0, updated_at: Utc::now() })
    });

    let (status, body) = get_request("/config", &[], configure_with(MockStorefront::new(), catalog_mock)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("valid json");
    assert_eq!(json["ok"], true);
    assert_eq!(json["text"], "Buy now");
    assert_eq!(json["version"], 0);
}

#[actix_web::test]
async fn unknown_public_product_is_not_found() {
    let _ = env_logger::try_init().ok();
    let mut catalog_mock = MockStorefront::new();
    catalog_mock.expect_fetch_product_by_short_id().returning(|_| Ok(None));
    let (status, body) =
        get_request("/products/by-short/nosuch", &[], configure_with(MockStorefront::new(), catalog_mock)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"));
}

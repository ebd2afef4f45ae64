//! Integration tests for the device config projection.
use q2b_common::Money;
use qr2buy_engine::{
    db_types::{DeviceUpdate, ItemStatus, NewDevice, NewProduct, ProductUpdate},
    display::{DEFAULT_DISPLAY_TEXT, SOLD_DISPLAY_TEXT},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{CatalogManagement, StorefrontError},
    DeviceConfigApi,
    SqliteDatabase,
};

const BASE_URL: &str = "https://shop.example.com";

async fn new_api() -> (SqliteDatabase, DeviceConfigApi<SqliteDatabase>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let api = DeviceConfigApi::new(db.clone(), BASE_URL);
    (db, api)
}

#[tokio::test]
async fn first_contact_auto_provisions_the_device() {
    let (db, api) = new_api().await;
    assert!(db.fetch_device_by_device_id("ESP32-NEW-001").await.expect("fetch").is_none());

    let config = api.config_for_device("ESP32-NEW-001", None).await.expect("config");
    assert_eq!(config.device_id, "ESP32-NEW-001");
    assert_eq!(config.status, ItemStatus::Available);
    assert_eq!(config.text, DEFAULT_DISPLAY_TEXT);
    assert_eq!(config.qr, None);

    let device = db.fetch_device_by_device_id("ESP32-NEW-001").await.expect("fetch").expect("provisioned");
    assert_eq!(device.status, ItemStatus::Available);
    assert!(device.last_seen_at.is_some(), "poll must stamp last_seen_at");
}

#[tokio::test]
async fn device_ids_are_trimmed_but_case_sensitive() {
    let (db, api) = new_api().await;
    api.config_for_device("  ESP32-Trim-01  ", None).await.expect("config");
    assert!(db.fetch_device_by_device_id("ESP32-Trim-01").await.expect("fetch").is_some());
    assert!(db.fetch_device_by_device_id("esp32-trim-01").await.expect("fetch").is_none());
}

#[tokio::test]
async fn secret_gate_rejects_wrong_and_absent_credentials() {
    let (db, api) = new_api().await;
    let device = db.create_device(NewDevice::new("ESP32-SECRET")).await.expect("create");
    let update = DeviceUpdate { device_secret: Some("s3cret".to_string()), ..Default::default() };
    db.update_device(device.id, update).await.expect("set secret");

    let err = api.config_for_device("ESP32-SECRET", Some("wrong")).await.expect_err("wrong secret");
    assert!(matches!(err, StorefrontError::InvalidDeviceSecret));
    let err = api.config_for_device("ESP32-SECRET", None).await.expect_err("absent secret");
    assert!(matches!(err, StorefrontError::InvalidDeviceSecret));
    api.config_for_device("ESP32-SECRET", Some("s3cret")).await.expect("correct secret accepted");

    // Secretless devices accept anything.
    db.create_device(NewDevice::new("ESP32-OPEN")).await.expect("create");
    api.config_for_device("ESP32-OPEN", Some("whatever")).await.expect("open device");
}

#[tokio::test]
async fn linked_product_drives_the_payload() {
    let (db, api) = new_api().await;
    let product = db
        .create_product(NewProduct::new("Vintage lamp", Money::from(1999)).with_short_id("ab12cd"))
        .await
        .expect("create product");
    let device = db.create_device(NewDevice::new("ESP32-DEMO-001")).await.expect("create device");
    db.link_device_to_product(device.id, product.id).await.expect("link");

    let config = api.config_for_device("ESP32-DEMO-001", None).await.expect("config");
    assert_eq!(config.status, ItemStatus::Available);
    assert_eq!(config.text, "Vintage lamp");
    assert_eq!(config.qr.as_deref(), Some("https://shop.example.com/p/ab12cd"));

    // Product status takes precedence over the device's own status, and a sold item hides its QR code.
    let update = ProductUpdate { status: Some(ItemStatus::Sold), ..Default::default() };
    db.update_product(product.id, update).await.expect("mark sold");
    let config = api.config_for_device("ESP32-DEMO-001", None).await.expect("config");
    assert_eq!(config.status, ItemStatus::Sold);
    assert_eq!(config.text, SOLD_DISPLAY_TEXT);
    assert_eq!(config.qr, None);
}

#[tokio::test]
async fn version_is_stable_across_idle_polls() {
    let (_db, api) = new_api().await;
    let first = api.config_for_device("ESP32-IDLE", None).await.expect("config");
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = api.config_for_device("ESP32-IDLE", None).await.expect("config");
    assert_eq!(first.version, second.version, "a routine poll must not churn the change-detection token");
}

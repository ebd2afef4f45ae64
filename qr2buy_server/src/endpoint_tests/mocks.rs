use chrono::{TimeZone, Utc};
use mockall::mock;
use q2b_common::Money;
use qr2buy_engine::{
    db_types::{
        Device,
        DeviceUpdate,
        DisplayState,
        ItemStatus,
        Json,
        NewDevice,
        NewOrder,
        NewProduct,
        Order,
        Product,
        ProductUpdate,
    },
    traits::{CatalogManagement, StorefrontDatabase, StorefrontError},
};
use serde_json::Value;

mock! {
    pub Storefront {}

    impl Clone for Storefront {
        fn clone(&self) -> Self;
    }

    impl CatalogManagement for Storefront {
        async fn create_product(&self, product: NewProduct) -> Result<Product, StorefrontError>;
        async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError>;
        async fn fetch_product_by_id(&self, id: i64) -> Result<Option<Product>, StorefrontError>;
        async fn fetch_product_by_short_id(&self, short_id: &str) -> Result<Option<Product>, StorefrontError>;
        async fn fetch_products(&self, limit: i64) -> Result<Vec<Product>, StorefrontError>;
        async fn create_device(&self, device: NewDevice) -> Result<Device, StorefrontError>;
        async fn update_device(&self, id: i64, update: DeviceUpdate) -> Result<Device, StorefrontError>;
        async fn fetch_device_by_id(&self, id: i64) -> Result<Option<Device>, StorefrontError>;
        async fn fetch_device_by_device_id(&self, device_id: &str) -> Result<Option<Device>, StorefrontError>;
        async fn fetch_devices(&self, limit: i64) -> Result<Vec<Device>, StorefrontError>;
        async fn fetch_or_create_device(&self, device_id: &str) -> Result<Device, StorefrontError>;
        async fn touch_device_last_seen(&self, device_id: &str) -> Result<Device, StorefrontError>;
        async fn set_product_status(&self, id: i64, status: ItemStatus) -> Result<(Product, bool), StorefrontError>;
        async fn set_device_status(&self, id: i64, status: ItemStatus) -> Result<(Device, bool), StorefrontError>;
        async fn link_device_to_product(&self, device_id: i64, product_id: i64) -> Result<(Device, Product), StorefrontError>;
        async fn unlink_device_and_product(&self, device_id: Option<i64>, product_id: Option<i64>) -> Result<(Option<Device>, Option<Product>), StorefrontError>;
        async fn fetch_display_state(&self) -> Result<DisplayState, StorefrontError>;
        async fn update_display_state(&self, text: &str, qr: &str, version: i64) -> Result<DisplayState, StorefrontError>;
    }

    impl StorefrontDatabase for Storefront {
        fn url(&self) -> &str;
        async fn upsert_order(&self, order: NewOrder) -> Result<Order, StorefrontError>;
        async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, StorefrontError>;
        async fn close(&mut self) -> Result<(), StorefrontError>;
    }
}

pub fn product_fixture(id: i64, status: ItemStatus) -> Product {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    Product {
        id,
        short_id: "ab12cd".to_string(),
        name: "Vintage lamp".to_string(),
        price: Money::from(1999),
        currency: "EUR".to_string(),
        status,
        device_id: None,
        stripe_product_id: None,
        stripe_price_id: None,
        image_url: None,
        meta: Json(Value::Null),
        created_at: ts,
        updated_at: ts,
    }
}

pub fn device_fixture(id: i64, device_id: &str, status: ItemStatus) -> Device {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    Device {
        id,
        device_id: device_id.to_string(),
        name: None,
        status,
        product_id: None,
        last_seen_at: Some(ts),
        device_secret: None,
        meta: Json(Value::Null),
        created_at: ts,
        updated_at: ts,
    }
}

pub fn order_fixture(order: &NewOrder) -> Order {
    let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    Order {
        id: 1,
        session_id: order.session_id.clone(),
        payment_intent_id: order.payment_intent_id.clone(),
        product_id: order.product_id,
        device_id: order.device_id,
        status: order.status.clone(),
        amount: order.amount,
        currency: order.currency.clone(),
        raw: Json(order.raw.clone()),
        created_at: ts,
        updated_at: ts,
    }
}

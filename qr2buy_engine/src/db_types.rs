//! Data types shared between the database layer and the public APIs.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use q2b_common::{Money, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

// Re-exported so that API consumers can build the Json-wrapped fields without a direct sqlx dependency.
pub use sqlx::types::Json;

//--------------------------------------     ItemStatus      ---------------------------------------------------------
/// The binary sale state shared by products and devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ItemStatus {
    #[default]
    Available,
    Sold,
}

impl Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Available => write!(f, "AVAILABLE"),
            ItemStatus::Sold => write!(f, "SOLD"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid item status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for ItemStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "SOLD" => Ok(Self::Sold),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

impl From<String> for ItemStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid item status in storage: {value}. Defaulting to AVAILABLE");
            ItemStatus::Available
        })
    }
}

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    /// The stable public identifier printed into QR targets. Globally unique, lowercased at write time.
    pub short_id: String,
    pub name: String,
    /// The price in minor currency units (cents).
    pub price: Money,
    pub currency: String,
    pub status: ItemStatus,
    /// Weak back-reference to the linked device, if any. Kept consistent with [`Device::product_id`] by the link and
    /// unlink operations; never maintained by a foreign key.
    pub device_id: Option<i64>,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub image_url: Option<String>,
    pub meta: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewProduct      --------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    /// Public short identifier. Normalized to trimmed lowercase; generated randomly when omitted.
    pub short_id: Option<String>,
    pub name: String,
    /// Price in minor currency units.
    #[serde(default)]
    pub price: Money,
    pub currency: Option<String>,
    pub image_url: Option<String>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price: Money) -> Self {
        Self { short_id: None, name: name.into(), price, currency: None, image_url: None }
    }

    pub fn with_short_id<S: Into<String>>(mut self, short_id: S) -> Self {
        self.short_id = Some(short_id.into());
        self
    }
}

//--------------------------------------    ProductUpdate     --------------------------------------------------------
/// A partial update to a product record. Only the supplied fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub currency: Option<String>,
    pub status: Option<ItemStatus>,
    pub image_url: Option<String>,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() &&
            self.price.is_none() &&
            self.currency.is_none() &&
            self.status.is_none() &&
            self.image_url.is_none() &&
            self.stripe_product_id.is_none() &&
            self.stripe_price_id.is_none()
    }
}

//--------------------------------------        Device        --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    /// The hardware-assigned external identifier (e.g. `ESP32-DEMO-001`). Globally unique, trimmed, case-sensitive.
    pub device_id: String,
    pub name: Option<String>,
    pub status: ItemStatus,
    /// Weak back-reference to the linked product, if any. See [`Product::device_id`].
    pub product_id: Option<i64>,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Optional per-device shared secret. When set, config polls must present it.
    #[serde(skip_serializing, default)]
    pub device_secret: Option<String>,
    pub meta: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Whether the supplied credential satisfies this device's secret gate. Devices without a configured secret
    /// accept anything; devices with one reject both wrong and absent credentials.
    pub fn accepts_secret(&self, supplied: Option<&str>) -> bool {
        match &self.device_secret {
            None => true,
            Some(expected) => supplied == Some(expected.as_str()),
        }
    }
}

//--------------------------------------      NewDevice       --------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDevice {
    pub device_id: String,
    pub name: Option<String>,
    pub device_secret: Option<String>,
}

impl NewDevice {
    pub fn new<S: Into<String>>(device_id: S) -> Self {
        Self { device_id: device_id.into(), name: None, device_secret: None }
    }
}

//--------------------------------------     DeviceUpdate     --------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub status: Option<ItemStatus>,
    pub device_secret: Option<String>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none() && self.device_secret.is_none()
    }
}

//--------------------------------------        Order         --------------------------------------------------------
/// One receipt per payment session. `session_id` is the idempotency key: repeated confirmations for the same session
/// update this row and never create a second one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub product_id: i64,
    pub device_id: Option<i64>,
    /// Free-text provider status label, e.g. `paid` or `checkout.session.completed`.
    pub status: String,
    /// The amount in minor currency units.
    pub amount: Money,
    pub currency: String,
    /// Opaque snapshot of the triggering payment event, kept for audit.
    pub raw: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub product_id: i64,
    pub device_id: Option<i64>,
    pub status: String,
    pub amount: Money,
    pub currency: String,
    pub raw: Value,
}

impl NewOrder {
    pub fn new<S: Into<String>>(session_id: S, product_id: i64, amount: Money) -> Self {
        Self {
            session_id: session_id.into(),
            payment_intent_id: None,
            product_id,
            device_id: None,
            status: "paid".to_string(),
            amount,
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            raw: Value::Null,
        }
    }
}

//--------------------------------------    PaymentReceipt    --------------------------------------------------------
/// The provider-side facts about a completed payment session, as extracted by either confirmation path. The
/// fulfillment flow combines this with the resolved product/device to build the [`NewOrder`] upsert.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub status: String,
    pub amount: Money,
    pub currency: String,
    pub raw: Value,
}

//--------------------------------------     DisplayState     --------------------------------------------------------
/// The single-row legacy dashboard display state. Predates per-device configs and is still served to the old
/// dashboard at `GET /api/config` (without a `deviceId`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DisplayState {
    pub id: i64,
    pub text: String,
    pub qr: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trip() {
        assert_eq!("SOLD".parse::<ItemStatus>().unwrap(), ItemStatus::Sold);
        assert_eq!(ItemStatus::Available.to_string(), "AVAILABLE");
        assert!("sold".parse::<ItemStatus>().is_err());
        assert_eq!(ItemStatus::from("bogus".to_string()), ItemStatus::Available);
    }

    #[test]
    fn secret_gate() {
        let mut device = device_fixture();
        assert!(device.accepts_secret(None));
        assert!(device.accepts_secret(Some("anything")));
        device.device_secret = Some("s3cret".into());
        assert!(!device.accepts_secret(None));
        assert!(!device.accepts_secret(Some("wrong")));
        assert!(device.accepts_secret(Some("s3cret")));
    }

    fn device_fixture() -> Device {
        Device {
            id: 1,
            device_id: "ESP32-DEMO-001".into(),
            name: None,
            status: ItemStatus::Available,
            product_id: None,
            last_seen_at: None,
            device_secret: None,
            meta: Json(Value::Null),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

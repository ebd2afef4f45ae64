use std::fmt::Display;

use chrono::{DateTime, Utc};
use q2b_common::Money;
use qr2buy_engine::db_types::{ItemStatus, Product};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Query string of the firmware/dashboard config route. Without a device id the route serves the legacy dashboard
/// state instead of a per-device config.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigQuery {
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkParams {
    pub device_id: String,
    pub product_id: Option<i64>,
    pub product_short_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkParams {
    pub device_id: Option<String>,
    pub product_id: Option<i64>,
    pub product_short_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideStatusParams {
    pub device_id: Option<String>,
    pub product_id: Option<i64>,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
    pub device_id: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQuery {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDisplayParams {
    pub text: String,
    pub url: String,
}

/// The buyer-facing view of a product. Strips internal references and provider ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProduct {
    pub id: i64,
    pub short_id: String,
    pub name: String,
    pub price: Money,
    pub currency: String,
    pub status: ItemStatus,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for PublicProduct {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            short_id: p.short_id,
            name: p.name,
            price: p.price,
            currency: p.currency,
            status: p.status,
            image_url: p.image_url,
            updated_at: p.updated_at,
        }
    }
}

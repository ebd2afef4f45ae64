//! The read-side projection that turns Product/Device state into what a display actually shows.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Device, ItemStatus, Product};

/// The marker string shown on a display once its item is sold.
pub const SOLD_DISPLAY_TEXT: &str = "SOLD!";
/// The prompt shown when a device has no linked product.
pub const DEFAULT_DISPLAY_TEXT: &str = "Buy now";

//--------------------------------------    DisplayPayload    --------------------------------------------------------
/// The renderable state of one display. Broadcast to live observers and embedded in device config responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPayload {
    pub status: ItemStatus,
    pub text: String,
    /// Target URL for the QR code, or `None` when the display should not render one.
    #[serde(rename = "qrTarget")]
    pub qr: Option<String>,
    /// Change-detection token. Derived from modification times; clients compare for equality only.
    pub version: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl DisplayPayload {
    /// Compute the payload for a device/product pair.
    ///
    /// Product status takes precedence over the device's own status; the device is just a terminal for whatever is
    /// linked. The QR target is only present while the linked product can still be bought.
    pub fn build(product: Option<&Product>, device: Option<&Device>, base_url: &str) -> Self {
        let status = product
            .map(|p| p.status)
            .or_else(|| device.map(|d| d.status))
            .unwrap_or(ItemStatus::Available);
        let text = if status == ItemStatus::Sold {
            SOLD_DISPLAY_TEXT.to_string()
        } else {
            product.map(|p| p.name.clone()).unwrap_or_else(|| DEFAULT_DISPLAY_TEXT.to_string())
        };
        let qr = match (product, status) {
            (Some(p), ItemStatus::Available) => Some(product_page_url(base_url, &p.short_id)),
            _ => None,
        };
        let updated_at = match (product.map(|p| p.updated_at), device.map(|d| d.updated_at)) {
            (Some(p), Some(d)) => p.max(d),
            (Some(p), None) => p,
            (None, Some(d)) => d,
            (None, None) => Utc::now(),
        };
        let version = updated_at.timestamp_millis();
        Self { status, text, qr, version, updated_at }
    }
}

/// The public buyer page for a product.
pub fn product_page_url(base_url: &str, short_id: &str) -> String {
    format!("{}/p/{short_id}", base_url.trim_end_matches('/'))
}

//--------------------------------------  DeviceDisplayConfig  -------------------------------------------------------
/// The response shape of the firmware config poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDisplayConfig {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub status: ItemStatus,
    pub text: String,
    #[serde(rename = "qrTarget")]
    pub qr: Option<String>,
    pub version: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl DeviceDisplayConfig {
    pub fn new(device_id: String, payload: DisplayPayload) -> Self {
        let DisplayPayload { status, text, qr, version, updated_at } = payload;
        Self { device_id, status, text, qr, version, updated_at }
    }
}

use std::fmt::Debug;

use log::*;

use crate::{
    display::{DeviceDisplayConfig, DisplayPayload},
    traits::{CatalogManagement, StorefrontError},
};

/// `DeviceConfigApi` is the read-side projection that physical displays poll.
///
/// First contact from an unseen device id silently registers it (auto-provisioning), so hardware can be rolled out
/// without a manual pre-registration step. Every poll stamps the device's last-seen time for fleet monitoring,
/// whether or not the secret gate lets the request through.
pub struct DeviceConfigApi<B> {
    db: B,
    base_url: String,
}

impl<B> Debug for DeviceConfigApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceConfigApi ({})", self.base_url)
    }
}

impl<B> DeviceConfigApi<B> {
    pub fn new<S: Into<String>>(db: B, base_url: S) -> Self {
        Self { db, base_url: base_url.into() }
    }
}

impl<B> DeviceConfigApi<B>
where B: CatalogManagement
{
    /// Compute the current display payload for a device, provisioning it on first contact.
    ///
    /// The secret gate is opt-in per device: devices without a configured secret accept any (or no) credential;
    /// devices with one reject wrong and absent credentials with [`StorefrontError::InvalidDeviceSecret`].
    pub async fn config_for_device(
        &self,
        device_id: &str,
        secret: Option<&str>,
    ) -> Result<DeviceDisplayConfig, StorefrontError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(StorefrontError::InvalidInput("deviceId is required".to_string()));
        }
        self.db.fetch_or_create_device(device_id).await?;
        let device = self.db.touch_device_last_seen(device_id).await?;
        if !device.accepts_secret(secret) {
            warn!("🖥️ Device {device_id} presented an invalid secret");
            return Err(StorefrontError::InvalidDeviceSecret);
        }
        let product = match device.product_id {
            Some(product_pk) => self.db.fetch_product_by_id(product_pk).await?,
            None => None,
        };
        let payload = DisplayPayload::build(product.as_ref(), Some(&device), &self.base_url);
        trace!("🖥️ Config for {device_id}: {} '{}' v{}", payload.status, payload.text, payload.version);
        Ok(DeviceDisplayConfig::new(device.device_id, payload))
    }
}

use std::fmt::Debug;

use chrono::Utc;
use log::*;
use q2b_common::DEFAULT_CURRENCY_CODE;
use rand::Rng;

use crate::{
    db_types::{
        Device,
        DeviceUpdate,
        DisplayState,
        ItemStatus,
        NewDevice,
        NewProduct,
        Product,
        ProductUpdate,
    },
    events::{DisplayChangedEvent, DisplayStateUpdatedEvent, EventProducers},
    traits::{CatalogManagement, StorefrontError},
};

const SHORT_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SHORT_ID_LEN: usize = 6;
const MAX_LEGACY_TEXT_LEN: usize = 80;

/// `CatalogApi` covers the admin surface: product/device CRUD, the Device<->Product link, status overrides and the
/// legacy dashboard display state. Every status-affecting mutation notifies the display-changed hook so that
/// connected displays stay in sync with manual corrections.
pub struct CatalogApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement
{
    pub async fn create_product(&self, mut product: NewProduct) -> Result<Product, StorefrontError> {
        if product.name.trim().is_empty() {
            return Err(StorefrontError::InvalidInput("name is required".to_string()));
        }
        if product.price.is_negative() {
            return Err(StorefrontError::InvalidInput("price must not be negative".to_string()));
        }
        let short_id = match product.short_id.as_deref().map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()) {
            Some(s) => s,
            None => self.generate_unique_short_id().await?,
        };
        product.short_id = Some(short_id);
        product.currency = Some(
            product
                .currency
                .as_deref()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string()),
        );
        self.db.create_product(product).await
    }

    async fn generate_unique_short_id(&self) -> Result<String, StorefrontError> {
        loop {
            let candidate: String = {
                let mut rng = rand::thread_rng();
                (0..SHORT_ID_LEN).map(|_| SHORT_ID_ALPHABET[rng.gen_range(0..SHORT_ID_ALPHABET.len())] as char).collect()
            };
            if self.db.fetch_product_by_short_id(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
    }

    pub async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError> {
        if let Some(price) = update.price {
            if price.is_negative() {
                return Err(StorefrontError::InvalidInput("price must not be negative".to_string()));
            }
        }
        let product = self.db.update_product(id, update).await?;
        let device = match product.device_id {
            Some(device_pk) => self.db.fetch_device_by_id(device_pk).await?,
            None => None,
        };
        self.call_display_changed_hook(DisplayChangedEvent::new(Some(product.clone()), device)).await;
        Ok(product)
    }

    pub async fn product_by_id(&self, id: i64) -> Result<Option<Product>, StorefrontError> {
        self.db.fetch_product_by_id(id).await
    }

    pub async fn product_by_short_id(&self, short_id: &str) -> Result<Option<Product>, StorefrontError> {
        self.db.fetch_product_by_short_id(&short_id.trim().to_lowercase()).await
    }

    pub async fn products(&self, limit: i64) -> Result<Vec<Product>, StorefrontError> {
        self.db.fetch_products(limit).await
    }

    pub async fn create_device(&self, device: NewDevice) -> Result<Device, StorefrontError> {
        self.db.create_device(device).await
    }

    pub async fn update_device(&self, id: i64, update: DeviceUpdate) -> Result<Device, StorefrontError> {
        let device = self.db.update_device(id, update).await?;
        let product = match device.product_id {
            Some(product_pk) => self.db.fetch_product_by_id(product_pk).await?,
            None => None,
        };
        self.call_display_changed_hook(DisplayChangedEvent::new(product, Some(device.clone()))).await;
        Ok(device)
    }

    pub async fn device_by_device_id(&self, device_id: &str) -> Result<Option<Device>, StorefrontError> {
        self.db.fetch_device_by_device_id(device_id.trim()).await
    }

    pub async fn devices(&self, limit: i64) -> Result<Vec<Device>, StorefrontError> {
        self.db.fetch_devices(limit).await
    }

    /// Establish the 1:1 link. Both back-references are written together; an existing link on either side is
    /// replaced.
    pub async fn link(&self, device_pk: i64, product_pk: i64) -> Result<(Device, Product), StorefrontError> {
        let (device, product) = self.db.link_device_to_product(device_pk, product_pk).await?;
        info!("🗂️ Linked device {} to product {}", device.device_id, product.short_id);
        self.call_display_changed_hook(DisplayChangedEvent::new(Some(product.clone()), Some(device.clone()))).await;
        Ok((device, product))
    }

    /// Destroy the link from whichever side was identified.
    pub async fn unlink(
        &self,
        device_pk: Option<i64>,
        product_pk: Option<i64>,
    ) -> Result<(Option<Device>, Option<Product>), StorefrontError> {
        if device_pk.is_none() && product_pk.is_none() {
            return Err(StorefrontError::InvalidInput("either a device or a product must be identified".to_string()));
        }
        let (device, product) = self.db.unlink_device_and_product(device_pk, product_pk).await?;
        self.call_display_changed_hook(DisplayChangedEvent::new(product.clone(), device.clone())).await;
        Ok((device, product))
    }

    /// Direct status override for manual corrections. Either side is optional; an unknown identifier on one side is
    /// reported as `None` rather than failing the whole override.
    pub async fn override_status(
        &self,
        device_id: Option<&str>,
        product_pk: Option<i64>,
        status: ItemStatus,
    ) -> Result<(Option<Device>, Option<Product>), StorefrontError> {
        let mut device = None;
        if let Some(device_id) = device_id.map(str::trim).filter(|d| !d.is_empty()) {
            if let Some(d) = self.db.fetch_device_by_device_id(device_id).await? {
                let (d, _) = self.db.set_device_status(d.id, status).await?;
                device = Some(d);
            }
        }
        let mut product = None;
        if let Some(product_pk) = product_pk {
            if self.db.fetch_product_by_id(product_pk).await?.is_some() {
                let (p, _) = self.db.set_product_status(product_pk, status).await?;
                product = Some(p);
            }
        }
        info!(
            "🗂️ Status override to {status} applied (device: {:?}, product: {:?})",
            device.as_ref().map(|d| d.device_id.as_str()),
            product.as_ref().map(|p| p.short_id.as_str())
        );
        if device.is_some() || product.is_some() {
            self.call_display_changed_hook(DisplayChangedEvent::new(product.clone(), device.clone())).await;
        }
        Ok((device, product))
    }

    pub async fn display_state(&self) -> Result<DisplayState, StorefrontError> {
        self.db.fetch_display_state().await
    }

    /// Replace the legacy dashboard display state. The version token is the current unix-ms timestamp.
    pub async fn update_display(&self, text: &str, url: &str) -> Result<DisplayState, StorefrontError> {
        let text = text.trim();
        if text.is_empty() || text.len() > MAX_LEGACY_TEXT_LEN {
            return Err(StorefrontError::InvalidInput(format!(
                "text must be between 1 and {MAX_LEGACY_TEXT_LEN} characters"
            )));
        }
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(StorefrontError::InvalidInput("a valid http(s) url is required".to_string()));
        }
        let version = Utc::now().timestamp_millis();
        let state = self.db.update_display_state(text, url, version).await?;
        self.call_display_state_updated_hook(DisplayStateUpdatedEvent { state: state.clone() }).await;
        Ok(state)
    }

    async fn call_display_changed_hook(&self, event: DisplayChangedEvent) {
        for emitter in &self.producers.display_changed_producer {
            trace!("🗂️ Notifying display-changed hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    async fn call_display_state_updated_hook(&self, event: DisplayStateUpdatedEvent) {
        for emitter in &self.producers.display_state_updated_producer {
            trace!("🗂️ Notifying display-state hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}

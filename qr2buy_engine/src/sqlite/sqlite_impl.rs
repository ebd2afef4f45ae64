//! `SqliteDatabase` is a concrete implementation of a qr2buy engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module by delegating to the low-level functions in [`super::db`].
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{devices, display, new_pool, orders, products};
use crate::{
    db_types::{
        Device,
        DeviceUpdate,
        DisplayState,
        ItemStatus,
        NewDevice,
        NewOrder,
        NewProduct,
        Order,
        Product,
        ProductUpdate,
    },
    traits::{CatalogManagement, StorefrontDatabase, StorefrontError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, StorefrontError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn create_product(&self, product: NewProduct) -> Result<Product, StorefrontError> {
        let short_id = product
            .short_id
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorefrontError::InvalidInput("short_id must be resolved before insert".to_string()))?;
        let mut conn = self.pool.acquire().await?;
        let created = products::insert_product(&short_id, &product, &mut conn).await?;
        debug!("🗃️ Product '{}' created with short id {}", created.name, created.short_id);
        Ok(created)
    }

    async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        products::update_product(id, update, &mut conn)
            .await?
            .ok_or_else(|| StorefrontError::ProductNotFound(id.to_string()))
    }

    async fn fetch_product_by_id(&self, id: i64) -> Result<Option<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::product_by_id(id, &mut conn).await?)
    }

    async fn fetch_product_by_short_id(&self, short_id: &str) -> Result<Option<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::product_by_short_id(short_id, &mut conn).await?)
    }

    async fn fetch_products(&self, limit: i64) -> Result<Vec<Product>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_products(limit, &mut conn).await?)
    }

    async fn create_device(&self, device: NewDevice) -> Result<Device, StorefrontError> {
        if device.device_id.trim().is_empty() {
            return Err(StorefrontError::InvalidInput("device_id is required".to_string()));
        }
        let mut conn = self.pool.acquire().await?;
        let created = devices::insert_device(&device, &mut conn).await?;
        debug!("🗃️ Device {} registered with id {}", created.device_id, created.id);
        Ok(created)
    }

    async fn update_device(&self, id: i64, update: DeviceUpdate) -> Result<Device, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        devices::update_device(id, update, &mut conn)
            .await?
            .ok_or_else(|| StorefrontError::DeviceNotFound(id.to_string()))
    }

    async fn fetch_device_by_id(&self, id: i64) -> Result<Option<Device>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(devices::device_by_id(id, &mut conn).await?)
    }

    async fn fetch_device_by_device_id(&self, device_id: &str) -> Result<Option<Device>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(devices::device_by_device_id(device_id, &mut conn).await?)
    }

    async fn fetch_devices(&self, limit: i64) -> Result<Vec<Device>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(devices::fetch_devices(limit, &mut conn).await?)
    }

    async fn fetch_or_create_device(&self, device_id: &str) -> Result<Device, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        let device = devices::fetch_or_create_device(device_id, &mut conn).await?;
        Ok(device)
    }

    async fn touch_device_last_seen(&self, device_id: &str) -> Result<Device, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        devices::touch_last_seen(device_id.trim(), &mut conn)
            .await?
            .ok_or_else(|| StorefrontError::DeviceNotFound(device_id.to_string()))
    }

    async fn set_product_status(&self, id: i64, status: ItemStatus) -> Result<(Product, bool), StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        match products::set_product_status(id, status, &mut conn).await? {
            Some(product) => {
                debug!("🗃️ Product #{id} status set to {status}");
                Ok((product, true))
            },
            // No row matched: either the status was already current (no-op) or the product is gone.
            None => products::product_by_id(id, &mut conn)
                .await?
                .map(|p| (p, false))
                .ok_or_else(|| StorefrontError::ProductNotFound(id.to_string())),
        }
    }

    async fn set_device_status(&self, id: i64, status: ItemStatus) -> Result<(Device, bool), StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        match devices::set_device_status(id, status, &mut conn).await? {
            Some(device) => {
                debug!("🗃️ Device #{id} status set to {status}");
                Ok((device, true))
            },
            None => devices::device_by_id(id, &mut conn)
                .await?
                .map(|d| (d, false))
                .ok_or_else(|| StorefrontError::DeviceNotFound(id.to_string())),
        }
    }

    async fn link_device_to_product(
        &self,
        device_id: i64,
        product_id: i64,
    ) -> Result<(Device, Product), StorefrontError> {
        let mut tx = self.pool.begin().await?;
        let device = devices::set_product_link(device_id, Some(product_id), &mut tx)
            .await?
            .ok_or_else(|| StorefrontError::DeviceNotFound(device_id.to_string()))?;
        let product = products::set_device_link(product_id, Some(device_id), &mut tx)
            .await?
            .ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))?;
        tx.commit().await?;
        debug!("🗃️ Device #{device_id} linked to product #{product_id}");
        Ok((device, product))
    }

    async fn unlink_device_and_product(
        &self,
        device_id: Option<i64>,
        product_id: Option<i64>,
    ) -> Result<(Option<Device>, Option<Product>), StorefrontError> {
        let mut tx = self.pool.begin().await?;
        // Resolve the missing side through the existing back-reference before clearing anything.
        let mut device = match device_id {
            Some(id) => devices::device_by_id(id, &mut tx).await?,
            None => None,
        };
        let mut product = match product_id {
            Some(id) => products::product_by_id(id, &mut tx).await?,
            None => None,
        };
        if product.is_none() {
            if let Some(pid) = device.as_ref().and_then(|d| d.product_id) {
                product = products::product_by_id(pid, &mut tx).await?;
            }
        }
        if device.is_none() {
            if let Some(did) = product.as_ref().and_then(|p| p.device_id) {
                device = devices::device_by_id(did, &mut tx).await?;
            }
        }
        let device = match device {
            Some(d) => devices::set_product_link(d.id, None, &mut tx).await?,
            None => None,
        };
        let product = match product {
            Some(p) => products::set_device_link(p.id, None, &mut tx).await?,
            None => None,
        };
        tx.commit().await?;
        debug!(
            "🗃️ Unlinked device {:?} and product {:?}",
            device.as_ref().map(|d| d.id),
            product.as_ref().map(|p| p.id)
        );
        Ok((device, product))
    }

    async fn fetch_display_state(&self) -> Result<DisplayState, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        display::fetch_display_state(&mut conn).await
    }

    async fn update_display_state(&self, text: &str, qr: &str, version: i64) -> Result<DisplayState, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        display::update_display_state(text, qr, version, &mut conn).await
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn upsert_order(&self, order: NewOrder) -> Result<Order, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        orders::upsert_order(order, &mut conn).await
    }

    async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, StorefrontError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_session_id(session_id, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), StorefrontError> {
        self.pool.close().await;
        Ok(())
    }
}

use crate::{
    db_types::{Device, DeviceUpdate, DisplayState, ItemStatus, NewDevice, NewProduct, Product, ProductUpdate},
    traits::StorefrontError,
};

/// Read and admin-write access to the product/device catalog and the legacy display state.
///
/// Uniqueness of `short_id` and `device_id` is enforced at the storage layer; attempts to insert duplicates are
/// reported as [`StorefrontError::DuplicateShortId`] / [`StorefrontError::DuplicateDeviceId`], never as a generic
/// database error.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement: Clone {
    /// Insert a new product. The caller is responsible for short-id normalization; the storage layer only enforces
    /// uniqueness.
    async fn create_product(&self, product: NewProduct) -> Result<Product, StorefrontError>;

    /// Apply a partial update. Supplied fields win; the rest are untouched. `updated_at` is always refreshed.
    async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, StorefrontError>;

    async fn fetch_product_by_id(&self, id: i64) -> Result<Option<Product>, StorefrontError>;

    async fn fetch_product_by_short_id(&self, short_id: &str) -> Result<Option<Product>, StorefrontError>;

    /// Most recently created products first.
    async fn fetch_products(&self, limit: i64) -> Result<Vec<Product>, StorefrontError>;

    async fn create_device(&self, device: NewDevice) -> Result<Device, StorefrontError>;

    async fn update_device(&self, id: i64, update: DeviceUpdate) -> Result<Device, StorefrontError>;

    async fn fetch_device_by_id(&self, id: i64) -> Result<Option<Device>, StorefrontError>;

    async fn fetch_device_by_device_id(&self, device_id: &str) -> Result<Option<Device>, StorefrontError>;

    /// Most recently updated devices first.
    async fn fetch_devices(&self, limit: i64) -> Result<Vec<Device>, StorefrontError>;

    /// Fetch the device with the given external id, creating it with default state if it has never been seen.
    /// This is the auto-provisioning step behind the firmware config poll.
    async fn fetch_or_create_device(&self, device_id: &str) -> Result<Device, StorefrontError>;

    /// Record a config poll by stamping `last_seen_at` with the current time. Returns the updated device.
    async fn touch_device_last_seen(&self, device_id: &str) -> Result<Device, StorefrontError>;

    /// Set the status of a product iff it differs from the current value. Returns the (possibly unchanged) product
    /// and whether a write happened. Calling this with the current status is a no-op.
    async fn set_product_status(&self, id: i64, status: ItemStatus) -> Result<(Product, bool), StorefrontError>;

    /// Device counterpart of [`Self::set_product_status`].
    async fn set_device_status(&self, id: i64, status: ItemStatus) -> Result<(Device, bool), StorefrontError>;

    /// Establish the 1:1 link by writing both back-references in a single transaction. An existing link on either
    /// side is overwritten.
    async fn link_device_to_product(
        &self,
        device_id: i64,
        product_id: i64,
    ) -> Result<(Device, Product), StorefrontError>;

    /// Destroy the link. Either side may be identified; the missing side is resolved through the existing
    /// back-reference. Both sides are cleared in a single transaction.
    async fn unlink_device_and_product(
        &self,
        device_id: Option<i64>,
        product_id: Option<i64>,
    ) -> Result<(Option<Device>, Option<Product>), StorefrontError>;

    /// Fetch the legacy single-display state, creating the default row on first access.
    async fn fetch_display_state(&self) -> Result<DisplayState, StorefrontError>;

    /// Replace the legacy display state with the given text/QR target and version token.
    async fn update_display_state(&self, text: &str, qr: &str, version: i64) -> Result<DisplayState, StorefrontError>;
}

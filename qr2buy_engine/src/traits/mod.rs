//! The behaviour a storage backend must provide to power the engine.
//!
//! [`CatalogManagement`] covers reads, admin mutations and device provisioning. [`StorefrontDatabase`] adds the
//! write operations the fulfillment flow depends on. Backends implement both; the APIs in [`crate::api`] are generic
//! over them so that tests can substitute mocks.
mod catalog_management;
mod storefront_database;

use thiserror::Error;

pub use catalog_management::CatalogManagement;
pub use storefront_database::StorefrontDatabase;

#[derive(Debug, Clone, Error)]
pub enum StorefrontError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(String),
    #[error("Device {0} does not exist")]
    DeviceNotFound(String),
    #[error("Order for session {0} does not exist")]
    OrderNotFound(String),
    #[error("A product with short id '{0}' already exists")]
    DuplicateShortId(String),
    #[error("A device with device id '{0}' already exists")]
    DuplicateDeviceId(String),
    #[error("Invalid device secret")]
    InvalidDeviceSecret,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for StorefrontError {
    fn from(e: sqlx::Error) -> Self {
        StorefrontError::DatabaseError(e.to_string())
    }
}

impl StorefrontError {
    /// True when the error is the storage layer's distinct duplicate-key conflict condition.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateShortId(_) | Self::DuplicateDeviceId(_))
    }
}

/// Map a sqlx error to the distinct duplicate-key condition via `make_conflict`, or pass it through as a database
/// error otherwise.
pub(crate) fn map_unique_violation<F>(e: sqlx::Error, make_conflict: F) -> StorefrontError
where F: FnOnce() -> StorefrontError {
    let is_unique_violation = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
    if is_unique_violation {
        make_conflict()
    } else {
        StorefrontError::from(e)
    }
}

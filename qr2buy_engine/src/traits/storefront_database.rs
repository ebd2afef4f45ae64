use crate::{
    db_types::{NewOrder, Order},
    traits::{CatalogManagement, StorefrontError},
};

/// The highest level of behaviour for backends supporting the qr2buy engine: everything in [`CatalogManagement`]
/// plus the order receipt operations the fulfillment flow depends on.
///
/// Correctness under concurrent confirmation attempts rests on these operations being idempotent at the storage
/// layer (conditional status writes, upsert-by-session-id) rather than on any in-process locking.
#[allow(async_fn_in_trait)]
pub trait StorefrontDatabase: Clone + CatalogManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Insert or update the order for `order.session_id` in a single atomic statement. The first call inserts;
    /// every later call with the same session id updates the same row with the latest fields. Never creates a
    /// duplicate, never surfaces a duplicate-key error.
    async fn upsert_order(&self, order: NewOrder) -> Result<Order, StorefrontError>;

    async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, StorefrontError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StorefrontError> {
        Ok(())
    }
}

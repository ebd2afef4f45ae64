use serde::{Deserialize, Serialize};

use crate::db_types::{Device, DisplayState, Order, Product};

/// Fired once per confirmed payment session, after the product/device transition and the order upsert have both
/// been persisted. Repeated confirmations for the same session fire this again with the updated order row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleCompletedEvent {
    pub product: Product,
    pub device: Option<Device>,
    pub order: Order,
}

/// Fired whenever the renderable state of a display may have changed: a sale resolved, an admin override, a status
/// patch, or a link/unlink. Carries the entities so that subscribers can build whatever payload they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayChangedEvent {
    pub product: Option<Product>,
    pub device: Option<Device>,
}

impl DisplayChangedEvent {
    pub fn new(product: Option<Product>, device: Option<Device>) -> Self {
        Self { product, device }
    }
}

/// Fired when the legacy single-display state is replaced via the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayStateUpdatedEvent {
    pub state: DisplayState,
}

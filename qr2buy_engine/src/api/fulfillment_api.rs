use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Device, ItemStatus, NewOrder, Order, PaymentReceipt, Product},
    events::{DisplayChangedEvent, EventProducers, SaleCompletedEvent},
    traits::{StorefrontDatabase, StorefrontError},
};

/// The outcome of resolving a completed payment onto the catalog.
#[derive(Debug, Clone)]
pub struct SaleResolution {
    pub product: Product,
    pub device: Option<Device>,
    /// Whether this call actually transitioned any state. False on retries of an already-resolved sale.
    pub state_changed: bool,
}

/// A fully confirmed sale: the resolved entities plus the persisted order receipt.
#[derive(Debug, Clone)]
pub struct SaleConfirmation {
    pub product: Product,
    pub device: Option<Device>,
    pub order: Order,
}

/// `FulfillmentApi` serializes purchase completion. Both payment confirmation paths (webhook push and client-side
/// verify) funnel into [`Self::confirm_sale`], and may do so concurrently and repeatedly for the same session:
/// every operation here is idempotent, so calling it N times is observably equivalent to calling it once.
pub struct FulfillmentApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for FulfillmentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FulfillmentApi")
    }
}

impl<B> FulfillmentApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> FulfillmentApi<B>
where B: StorefrontDatabase
{
    /// Transition the product (and its display, if one can be resolved) to SOLD.
    ///
    /// The device is resolved from the metadata hint first, falling back to the product's linked device. A sale
    /// without a resolvable display is fine; a missing product is not.
    ///
    /// At most one write is persisted per entity, and none at all when both are already SOLD.
    pub async fn resolve_sale(
        &self,
        product_id: i64,
        device_hint: Option<&str>,
    ) -> Result<SaleResolution, StorefrontError> {
        let product = self
            .db
            .fetch_product_by_id(product_id)
            .await?
            .ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))?;
        let (product, product_changed) = if product.status == ItemStatus::Sold {
            (product, false)
        } else {
            self.db.set_product_status(product.id, ItemStatus::Sold).await?
        };

        let hint = device_hint.map(str::trim).filter(|h| !h.is_empty());
        let mut device = match hint {
            Some(device_id) => self.db.fetch_device_by_device_id(device_id).await?,
            None => None,
        };
        if device.is_none() {
            if let Some(device_pk) = product.device_id {
                device = self.db.fetch_device_by_id(device_pk).await?;
            }
        }
        let mut device_changed = false;
        let device = match device {
            Some(d) if d.status != ItemStatus::Sold => {
                let (d, changed) = self.db.set_device_status(d.id, ItemStatus::Sold).await?;
                device_changed = changed;
                Some(d)
            },
            other => other,
        };

        let state_changed = product_changed || device_changed;
        if state_changed {
            info!(
                "🔄️ Product #{} marked SOLD (display: {})",
                product.id,
                device.as_ref().map(|d| d.device_id.as_str()).unwrap_or("none")
            );
            self.call_display_changed_hook(DisplayChangedEvent::new(Some(product.clone()), device.clone())).await;
        } else {
            debug!("🔄️ Sale for product #{} already resolved; no writes performed", product.id);
        }
        Ok(SaleResolution { product, device, state_changed })
    }

    /// Store the order receipt for a session. First call inserts, repeats update the same row; see
    /// [`StorefrontDatabase::upsert_order`].
    pub async fn upsert_order(&self, order: NewOrder) -> Result<Order, StorefrontError> {
        self.db.upsert_order(order).await
    }

    pub async fn fetch_order_by_session_id(&self, session_id: &str) -> Result<Option<Order>, StorefrontError> {
        self.db.fetch_order_by_session_id(session_id).await
    }

    /// The shared confirmation flow behind both gateway paths: resolve the sale, then record the receipt keyed by
    /// the payment session.
    pub async fn confirm_sale(
        &self,
        product_id: i64,
        device_hint: Option<&str>,
        receipt: PaymentReceipt,
    ) -> Result<SaleConfirmation, StorefrontError> {
        let SaleResolution { product, device, .. } = self.resolve_sale(product_id, device_hint).await?;
        let order = NewOrder {
            session_id: receipt.session_id,
            payment_intent_id: receipt.payment_intent_id,
            product_id: product.id,
            device_id: device.as_ref().map(|d| d.id),
            status: receipt.status,
            amount: receipt.amount,
            currency: receipt.currency,
            raw: receipt.raw,
        };
        let order = self.db.upsert_order(order).await?;
        debug!("🔄️ Sale confirmed for session [{}]: order #{}", order.session_id, order.id);
        let event = SaleCompletedEvent { product: product.clone(), device: device.clone(), order: order.clone() };
        self.call_sale_completed_hook(event).await;
        Ok(SaleConfirmation { product, device, order })
    }

    async fn call_display_changed_hook(&self, event: DisplayChangedEvent) {
        for emitter in &self.producers.display_changed_producer {
            trace!("🔄️ Notifying display-changed hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    async fn call_sale_completed_hook(&self, event: SaleCompletedEvent) {
        for emitter in &self.producers.sale_completed_producer {
            trace!("🔄️ Notifying sale-completed hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}

//! Glue between Stripe's checkout session shape and the engine's fulfillment flow.
//!
//! Both confirmation paths (webhook push and client verify) end up here, so their semantics cannot drift apart:
//! identifier extraction, the receipt fields and the idempotent confirm call are shared.
use log::debug;
use q2b_common::{Money, DEFAULT_CURRENCY_CODE};
use qr2buy_engine::{db_types::PaymentReceipt, traits::StorefrontDatabase, FulfillmentApi, SaleConfirmation};
use serde_json::Value;
use stripe_tools::CheckoutSession;

use crate::errors::ServerError;

pub const METADATA_PRODUCT_ID: &str = "product_id";
pub const METADATA_PRODUCT_SHORT_ID: &str = "product_short_id";
pub const METADATA_DEVICE_ID: &str = "device_id";
pub const METADATA_SYSTEM: &str = "system";
pub const METADATA_SYSTEM_VALUE: &str = "qr2buy";

/// Resolve a paid checkout session against the catalog and record its order receipt.
///
/// A session without a product identifier in its metadata was created outside this system's checkout flow; that is
/// a `BadRequest`, and nothing is mutated.
pub async fn confirm_checkout_session<B: StorefrontDatabase>(
    session: &CheckoutSession,
    api: &FulfillmentApi<B>,
) -> Result<SaleConfirmation, ServerError> {
    let product_id = session
        .metadata_value(METADATA_PRODUCT_ID)
        .ok_or_else(|| ServerError::BadRequest("missing product_id in session metadata".to_string()))?;
    let product_id = product_id
        .parse::<i64>()
        .map_err(|_| ServerError::BadRequest(format!("invalid product_id '{product_id}' in session metadata")))?;
    let device_hint = session.metadata_value(METADATA_DEVICE_ID);
    debug!("🛍️ Confirming session [{}] for product #{product_id} (device hint: {device_hint:?})", session.id);
    let receipt = receipt_from_session(session);
    let confirmation = api.confirm_sale(product_id, device_hint, receipt).await?;
    Ok(confirmation)
}

/// The provider-side facts the order receipt is built from. Amounts stay in minor units end-to-end.
pub fn receipt_from_session(session: &CheckoutSession) -> PaymentReceipt {
    PaymentReceipt {
        session_id: session.id.clone(),
        payment_intent_id: session.payment_intent_id(),
        status: session.status_label(),
        amount: Money::from(session.amount_total.unwrap_or(0)),
        currency: session
            .currency
            .as_deref()
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string()),
        raw: serde_json::to_value(session).unwrap_or(Value::Null),
    }
}

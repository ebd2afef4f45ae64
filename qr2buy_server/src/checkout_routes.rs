//----------------------------------------------   Checkout  ----------------------------------------------------
//
// Session creation for buyers, plus the pull-side payment confirmation path: the returning buyer's browser asks us
// to verify its session against Stripe directly. This is the deliberate fallback for missed webhook deliveries, and
// it must be safe to race against the push path — both funnel into the same idempotent confirm flow.
use actix_web::{web, HttpResponse};
use log::*;
use qr2buy_engine::{
    db_types::{ItemStatus, Product},
    traits::{CatalogManagement, StorefrontDatabase},
    CatalogApi,
    FulfillmentApi,
};
use serde_json::json;
use stripe_tools::{NewCheckoutSession, StripeApi};

use crate::{
    config::ServerOptions,
    data_objects::{CheckoutParams, VerifyQuery},
    errors::ServerError,
    integrations::stripe::{
        confirm_checkout_session,
        METADATA_DEVICE_ID,
        METADATA_PRODUCT_ID,
        METADATA_PRODUCT_SHORT_ID,
        METADATA_SYSTEM,
        METADATA_SYSTEM_VALUE,
    },
    route,
};

route!(verify_checkout => Get "/verify" impl StorefrontDatabase);
/// The pull path: `GET /api/checkout/verify?session_id=cs_...`.
///
/// A session that is not yet paid answers 409 with the current provider status — the buyer page polls with backoff
/// until the bound is exhausted. Once any paid signal is present, this proceeds identically to the webhook path.
pub async fn verify_checkout<B: StorefrontDatabase>(
    query: web::Query<VerifyQuery>,
    stripe: web::Data<StripeApi>,
    api: web::Data<FulfillmentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = query.into_inner().session_id;
    if session_id.trim().is_empty() {
        return Err(ServerError::BadRequest("session_id required".to_string()));
    }
    debug!("🛍️ Verify request for session [{session_id}]");
    let session = stripe.get_checkout_session(session_id.trim()).await.map_err(|e| {
        warn!("🛍️ Could not retrieve session [{session_id}] from Stripe. {e}");
        ServerError::from(e)
    })?;
    if !session.is_paid() {
        let status = session.status_label();
        debug!("🛍️ Session [{session_id}] not paid yet (status: {status})");
        return Ok(HttpResponse::Conflict().json(json!({
            "ok": false,
            "error": "payment not completed",
            "status": status,
        })));
    }
    let confirmation = confirm_checkout_session(&session, api.as_ref()).await?;
    info!("🛍️ Session [{session_id}] verified and fulfilled");
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "mode": "verify",
        "order": confirmation.order,
        "product": confirmation.product,
        "device": confirmation.device,
    })))
}

route!(checkout_by_short => Post "/by-short/{short_id}" impl CatalogManagement);
/// `POST /api/checkout/by-short/{short_id}` — the buyer page's entry point.
pub async fn checkout_by_short<B: CatalogManagement>(
    path: web::Path<String>,
    body: Option<web::Json<CheckoutParams>>,
    api: web::Data<CatalogApi<B>>,
    stripe: web::Data<StripeApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let short_id = path.into_inner();
    debug!("🛍️ Checkout request for product '{short_id}'");
    let product = api
        .product_by_short_id(&short_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("product '{short_id}' not found")))?;
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    create_session_for_product(product, params, stripe.as_ref(), options.as_ref()).await
}

route!(checkout_by_id => Post "/{product_id}" impl CatalogManagement);
/// `POST /api/checkout/{product_id}` — same flow, keyed by the internal id.
pub async fn checkout_by_id<B: CatalogManagement>(
    path: web::Path<i64>,
    body: Option<web::Json<CheckoutParams>>,
    api: web::Data<CatalogApi<B>>,
    stripe: web::Data<StripeApi>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let product_id = path.into_inner();
    debug!("🛍️ Checkout request for product #{product_id}");
    let product = api
        .product_by_id(product_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("product #{product_id} not found")))?;
    let params = body.map(|b| b.into_inner()).unwrap_or_default();
    create_session_for_product(product, params, stripe.as_ref(), options.as_ref()).await
}

async fn create_session_for_product(
    product: Product,
    params: CheckoutParams,
    stripe: &StripeApi,
    options: &ServerOptions,
) -> Result<HttpResponse, ServerError> {
    if product.status != ItemStatus::Available {
        return Err(ServerError::Conflict("product not available".to_string()));
    }
    let base_url = &options.public_base_url;
    let metadata = vec![
        (METADATA_PRODUCT_ID.to_string(), product.id.to_string()),
        (METADATA_PRODUCT_SHORT_ID.to_string(), product.short_id.clone()),
        (METADATA_DEVICE_ID.to_string(), params.device_id.unwrap_or_default()),
        (METADATA_SYSTEM.to_string(), METADATA_SYSTEM_VALUE.to_string()),
    ];
    let new_session = NewCheckoutSession {
        success_url: format!("{base_url}/success?session_id={{CHECKOUT_SESSION_ID}}"),
        cancel_url: format!("{base_url}/cancel"),
        currency: product.currency.clone(),
        unit_amount: product.price.value(),
        product_name: product.name.clone(),
        quantity: params.quantity.unwrap_or(1),
        metadata,
    };
    let session = stripe.create_checkout_session(&new_session).await.map_err(|e| {
        warn!("🛍️ Could not create checkout session for product #{}. {e}", product.id);
        ServerError::from(e)
    })?;
    info!("🛍️ Checkout session {} created for product #{}", session.id, product.id);
    Ok(HttpResponse::Created().json(json!({
        "ok": true,
        "sessionId": session.id,
        "url": session.url,
    })))
}

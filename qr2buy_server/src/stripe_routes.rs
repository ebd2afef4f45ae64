//----------------------------------------------   Webhook  ----------------------------------------------------
//
// The push-side payment confirmation path. Stripe signs the exact bytes it sends, so the body is taken raw and
// verified before any parsing happens. Responses for recognized-but-unactionable events stay in the 200 range to
// prevent redelivery storms; genuine processing failures answer 5xx so that Stripe's redelivery retries them — the
// handler is safe to re-invoke for exactly that reason.
use actix_web::{web, HttpRequest, HttpResponse};
use log::*;
use qr2buy_engine::{traits::StorefrontDatabase, FulfillmentApi};
use serde_json::json;
use stripe_tools::{
    parse_event,
    verify_signature,
    StripeApi,
    DEFAULT_TOLERANCE_SECS,
    EVENT_CHECKOUT_ASYNC_PAYMENT_SUCCEEDED,
    EVENT_CHECKOUT_COMPLETED,
    EVENT_CHECKOUT_EXPIRED,
    SIGNATURE_HEADER,
};

use crate::{
    config::ServerOptions,
    data_objects::JsonResponse,
    errors::ServerError,
    integrations::stripe::confirm_checkout_session,
    route,
};

route!(stripe_webhook => Post "/webhook" impl StorefrontDatabase);
pub async fn stripe_webhook<B: StorefrontDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    stripe: web::Data<StripeApi>,
    api: web::Data<FulfillmentApi<B>>,
) -> HttpResponse {
    trace!("🛍️ Received webhook request: {}", req.uri());
    let event = match stripe.config().webhook_secret.as_ref() {
        Some(secret) => {
            let Some(signature) = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
                warn!("🛍️ Webhook request without a signature header. The request is rejected.");
                return HttpResponse::Unauthorized().json(JsonResponse::failure("missing signature"));
            };
            match verify_signature(&body, signature, secret.reveal(), Some(DEFAULT_TOLERANCE_SECS)) {
                Ok(event) => event,
                Err(e) => {
                    warn!("🛍️ Webhook signature verification failed: {e}. The request is rejected.");
                    return HttpResponse::Unauthorized().json(JsonResponse::failure("invalid signature"));
                },
            }
        },
        // A payment-integrity control never silently downgrades to "trust everything" in production.
        None if options.production => {
            error!("🛍️ Q2B_STRIPE_WEBHOOK_SECRET is missing in production. Refusing unsigned webhook.");
            return HttpResponse::InternalServerError().json(JsonResponse::failure("webhook secret missing"));
        },
        None => match parse_event(&body) {
            Ok(event) => event,
            Err(e) => {
                warn!("🛍️ Unsigned webhook body could not be parsed: {e}");
                return HttpResponse::BadRequest().json(JsonResponse::failure("invalid JSON body"));
            },
        },
    };

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED | EVENT_CHECKOUT_ASYNC_PAYMENT_SUCCEEDED => {
            let session = match event.checkout_session() {
                Ok(session) => session,
                Err(e) => {
                    warn!("🛍️ Webhook event {} carried a malformed session object: {e}", event.id);
                    return HttpResponse::BadRequest().json(JsonResponse::failure("malformed session object"));
                },
            };
            match confirm_checkout_session(&session, api.as_ref()).await {
                Ok(confirmation) => {
                    info!(
                        "🛍️ Webhook fulfilled session [{}]: product #{} SOLD",
                        confirmation.order.session_id, confirmation.product.id
                    );
                    HttpResponse::Ok().json(json!({"received": true}))
                },
                // A session without our metadata, or pointing at a vanished product, will not improve on
                // redelivery; acknowledge it so Stripe stops retrying.
                Err(ServerError::BadRequest(msg)) | Err(ServerError::NoRecordFound(msg)) => {
                    warn!("🛍️ Webhook session [{}] not actionable: {msg}", session.id);
                    HttpResponse::Ok().json(JsonResponse::failure(msg))
                },
                Err(e) => {
                    error!("🛍️ Webhook handler error for session [{}]: {e}", session.id);
                    HttpResponse::InternalServerError().json(JsonResponse::failure("webhook handler error"))
                },
            }
        },
        // Expired sessions deliberately stay untouched; releasing a display is a manual admin action.
        EVENT_CHECKOUT_EXPIRED => HttpResponse::Ok().json(json!({"received": true})),
        other => {
            debug!("🛍️ Ignoring webhook event type '{other}'");
            HttpResponse::Ok().json(json!({"received": true}))
        },
    }
}

//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database calls,
//! Stripe calls) must therefore be expressed as an async function so that worker threads keep serving other
//! requests while the operation is in flight.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use qr2buy_engine::{traits::CatalogManagement, CatalogApi, DeviceConfigApi};
use serde_json::json;

use crate::{
    broadcast::Broadcaster,
    data_objects::{ConfigQuery, PublicProduct, UpdateDisplayParams},
    errors::ServerError,
};

pub const DEVICE_SECRET_HEADER: &str = "x-device-secret";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
            impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/api/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().json(json!({
        "ok": true,
        "service": "qr2buy_api",
        "time": Utc::now(),
    }))
}

//--------------------------------------   Device / legacy config  ----------------------------------------------
route!(display_config => Get "/config" impl CatalogManagement);
/// The config poll.
///
/// With a `deviceId` query parameter this is the firmware route: auto-provisions unseen devices, enforces the
/// per-device secret (via the `x-device-secret` header) and returns the joined display payload. Without one it
/// serves the legacy dashboard's single display state, exactly as the old dashboard expects it.
pub async fn display_config<B: CatalogManagement>(
    req: HttpRequest,
    query: web::Query<ConfigQuery>,
    device_api: web::Data<DeviceConfigApi<B>>,
    catalog_api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let device_id = query.into_inner().device_id.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    match device_id {
        Some(device_id) => {
            trace!("💻️ GET config for device {device_id}");
            let secret = req.headers().get(DEVICE_SECRET_HEADER).and_then(|v| v.to_str().ok());
            let config = device_api.config_for_device(&device_id, secret).await?;
            Ok(HttpResponse::Ok().json(config))
        },
        None => {
            trace!("💻️ GET legacy display state");
            let state = catalog_api.display_state().await?;
            Ok(HttpResponse::Ok().json(json!({
                "ok": true,
                "text": state.text,
                "qr": state.qr,
                "version": state.version,
                "updatedAt": state.updated_at,
            })))
        },
    }
}

route!(update_display => Post "/updateDisplay" impl CatalogManagement);
/// Legacy dashboard write path: replaces the single display state and broadcasts the change to all observers.
pub async fn update_display<B: CatalogManagement>(
    body: web::Json<UpdateDisplayParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UpdateDisplayParams { text, url } = body.into_inner();
    debug!("💻️ POST updateDisplay '{text}'");
    let state = api.update_display(&text, &url).await?;
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "text": state.text,
        "qr": state.qr,
        "version": state.version,
        "updatedAt": state.updated_at,
    })))
}

//----------------------------------------------   Public  ----------------------------------------------------
route!(public_product_by_short => Get "/products/by-short/{short_id}" impl CatalogManagement);
/// Public product lookup for the buyer page (`/p/{short_id}`).
pub async fn public_product_by_short<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let short_id = path.into_inner();
    debug!("💻️ GET public product {short_id}");
    let product = api
        .product_by_short_id(&short_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("product '{short_id}' not found")))?;
    Ok(HttpResponse::Ok().json(PublicProduct::from(product)))
}

route!(public_product_by_id => Get "/products/{id}" impl CatalogManagement);
pub async fn public_product_by_id<B: CatalogManagement>(
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET public product #{id}");
    let product =
        api.product_by_id(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("product #{id} not found")))?;
    Ok(HttpResponse::Ok().json(PublicProduct::from(product)))
}

route!(public_status_by_short => Get "/status/by-short/{short_id}" impl CatalogManagement);
/// Lightweight status check, polled by the buyer page while a purchase is pending.
pub async fn public_status_by_short<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let short_id = path.into_inner();
    let product = api
        .product_by_short_id(&short_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("product '{short_id}' not found")))?;
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "shortId": product.short_id,
        "status": product.status,
        "sold": product.status == qr2buy_engine::db_types::ItemStatus::Sold,
        "updatedAt": product.updated_at,
    })))
}

//----------------------------------------------   Live feeds  ------------------------------------------------
/// The stream transport: one-directional server push with client-side auto-reconnect.
#[get("/api/events")]
pub async fn sse_events(broadcaster: web::Data<Broadcaster>) -> HttpResponse {
    debug!("💻️ New SSE observer connecting");
    let stream = broadcaster.register_sse();
    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache, no-transform"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

/// The socket transport: bidirectional, actively health-checked by the broadcaster.
#[get("/ws")]
pub async fn websocket_entry(
    req: HttpRequest,
    stream: web::Payload,
    broadcaster: web::Data<Broadcaster>,
) -> Result<HttpResponse, actix_web::Error> {
    debug!("💻️ New WebSocket observer connecting");
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    broadcaster.spawn_ws_session(session, msg_stream);
    Ok(response)
}

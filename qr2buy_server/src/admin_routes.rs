//----------------------------------------------   Admin  ----------------------------------------------------
//
// The credential-gated admin surface: catalog CRUD, the Device<->Product link, and manual status overrides. The
// basic-auth gate is applied at the scope level in `server.rs`, so these handlers can assume an authenticated
// caller. Every status-affecting mutation goes through the CatalogApi, which notifies the broadcaster hooks —
// displays stay in sync with manual corrections without any extra wiring here.
use actix_web::{web, HttpResponse};
use log::*;
use qr2buy_engine::{
    db_types::{DeviceUpdate, NewDevice, NewProduct, ProductUpdate},
    traits::CatalogManagement,
    CatalogApi,
};
use serde_json::json;

use crate::{
    data_objects::{LinkParams, OverrideStatusParams, UnlinkParams},
    errors::ServerError,
    route,
};

const LIST_LIMIT: i64 = 500;

//----------------------------------------------   Products  ----------------------------------------------------
route!(create_product => Post "/products" impl CatalogManagement);
pub async fn create_product<B: CatalogManagement>(
    body: web::Json<NewProduct>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = body.into_inner();
    debug!("💻️ POST create product '{}'", product.name);
    let product = api.create_product(product).await?;
    Ok(HttpResponse::Created().json(product))
}

route!(list_products => Get "/products" impl CatalogManagement);
pub async fn list_products<B: CatalogManagement>(
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET products");
    let products = api.products(LIST_LIMIT).await?;
    Ok(HttpResponse::Ok().json(products))
}

route!(admin_product_by_short => Get "/products/by-short/{short_id}" impl CatalogManagement);
pub async fn admin_product_by_short<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let short_id = path.into_inner();
    let product = api
        .product_by_short_id(&short_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("product '{short_id}' not found")))?;
    Ok(HttpResponse::Ok().json(product))
}

route!(admin_product_by_id => Get "/products/{id}" impl CatalogManagement);
pub async fn admin_product_by_id<B: CatalogManagement>(
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let product =
        api.product_by_id(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("product #{id} not found")))?;
    Ok(HttpResponse::Ok().json(product))
}

route!(patch_product => Patch "/products/{id}" impl CatalogManagement);
pub async fn patch_product<B: CatalogManagement>(
    path: web::Path<i64>,
    body: web::Json<ProductUpdate>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PATCH product #{id}");
    let product = api.update_product(id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

//----------------------------------------------   Devices  ----------------------------------------------------
route!(create_device => Post "/devices" impl CatalogManagement);
pub async fn create_device<B: CatalogManagement>(
    body: web::Json<NewDevice>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let device = body.into_inner();
    debug!("💻️ POST create device '{}'", device.device_id);
    let device = api.create_device(device).await?;
    Ok(HttpResponse::Created().json(device))
}

route!(list_devices => Get "/devices" impl CatalogManagement);
pub async fn list_devices<B: CatalogManagement>(api: web::Data<CatalogApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET devices");
    let devices = api.devices(LIST_LIMIT).await?;
    Ok(HttpResponse::Ok().json(devices))
}

route!(patch_device => Patch "/devices/{id}" impl CatalogManagement);
pub async fn patch_device<B: CatalogManagement>(
    path: web::Path<i64>,
    body: web::Json<DeviceUpdate>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PATCH device #{id}");
    let device = api.update_device(id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(device))
}

//--------------------------------------------   Link / Unlink  -------------------------------------------------
route!(link_device => Post "/link" impl CatalogManagement);
/// Establish the 1:1 Device<->Product association. Both back-references are written together.
pub async fn link_device<B: CatalogManagement>(
    body: web::Json<LinkParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let LinkParams { device_id, product_id, product_short_id } = body.into_inner();
    if product_id.is_none() && product_short_id.is_none() {
        return Err(ServerError::BadRequest("deviceId and productId|productShortId required".to_string()));
    }
    info!("💻️ POST link device {device_id}");
    let device = api
        .device_by_device_id(&device_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound("device not found".to_string()))?;
    let product = match product_id {
        Some(id) => api.product_by_id(id).await?,
        None => api.product_by_short_id(product_short_id.as_deref().unwrap_or_default()).await?,
    }
    .ok_or_else(|| ServerError::NoRecordFound("product not found".to_string()))?;
    let (device, product) = api.link(device.id, product.id).await?;
    Ok(HttpResponse::Ok().json(json!({"ok": true, "device": device, "product": product})))
}

route!(unlink_device => Post "/unlink" impl CatalogManagement);
/// Destroy the association from whichever side was identified. Missing entities are reported as nulls rather than
/// failing the whole call, matching what the admin UI expects.
pub async fn unlink_device<B: CatalogManagement>(
    body: web::Json<UnlinkParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let UnlinkParams { device_id, product_id, product_short_id } = body.into_inner();
    if device_id.is_none() && product_id.is_none() && product_short_id.is_none() {
        return Err(ServerError::BadRequest("deviceId or productId|productShortId required".to_string()));
    }
    info!("💻️ POST unlink (device: {device_id:?}, product: {product_id:?}/{product_short_id:?})");
    let device_pk = match device_id.as_deref() {
        Some(id) => api.device_by_device_id(id).await?.map(|d| d.id),
        None => None,
    };
    let product_pk = match (product_id, product_short_id.as_deref()) {
        (Some(id), _) => api.product_by_id(id).await?.map(|p| p.id),
        (None, Some(short_id)) => api.product_by_short_id(short_id).await?.map(|p| p.id),
        (None, None) => None,
    };
    if device_pk.is_none() && product_pk.is_none() {
        return Ok(HttpResponse::Ok().json(json!({"ok": true, "device": null, "product": null})));
    }
    let (device, product) = api.unlink(device_pk, product_pk).await?;
    Ok(HttpResponse::Ok().json(json!({"ok": true, "device": device, "product": product})))
}

//-------------------------------------------   Status override  ------------------------------------------------
route!(override_status => Post "/override/status" impl CatalogManagement);
/// Manual status correction, bypassing the payment gateway. The broadcaster is notified through the same hooks as
/// the fulfillment flow, so displays follow the correction in near-real time.
pub async fn override_status<B: CatalogManagement>(
    body: web::Json<OverrideStatusParams>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let OverrideStatusParams { device_id, product_id, status } = body.into_inner();
    if device_id.is_none() && product_id.is_none() {
        return Err(ServerError::BadRequest("deviceId or productId required".to_string()));
    }
    info!("💻️ POST status override to {status}");
    let (device, product) = api.override_status(device_id.as_deref(), product_id, status).await?;
    Ok(HttpResponse::Ok().json(json!({"ok": true, "device": device, "product": product})))
}

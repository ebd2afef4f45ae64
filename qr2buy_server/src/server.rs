use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use qr2buy_engine::{
    display::DisplayPayload,
    events::{DisplayChangedEvent, DisplayStateUpdatedEvent, EventHandlers, EventHooks, EventProducers, SaleCompletedEvent},
    CatalogApi,
    DeviceConfigApi,
    FulfillmentApi,
    SqliteDatabase,
};
use serde_json::json;
use stripe_tools::StripeApi;

use crate::{
    admin_routes::{
        AdminProductByIdRoute,
        AdminProductByShortRoute,
        CreateDeviceRoute,
        CreateProductRoute,
        LinkDeviceRoute,
        ListDevicesRoute,
        ListProductsRoute,
        OverrideStatusRoute,
        PatchDeviceRoute,
        PatchProductRoute,
        UnlinkDeviceRoute,
    },
    broadcast::{Broadcaster, UPDATE_EVENT, VERSION_EVENT},
    checkout_routes::{CheckoutByIdRoute, CheckoutByShortRoute, VerifyCheckoutRoute},
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::BasicAuthMiddlewareFactory,
    routes::{
        health,
        sse_events,
        websocket_entry,
        DisplayConfigRoute,
        PublicProductByIdRoute,
        PublicProductByShortRoute,
        PublicStatusByShortRoute,
        UpdateDisplayRoute,
    },
    stripe_routes::StripeWebhookRoute,
};

const EVENT_BUFFER_SIZE: usize = 32;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let broadcaster = Broadcaster::new();
    let handlers = create_event_handlers(&broadcaster, &config);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, broadcaster, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Wire the engine's event hooks into the broadcaster. This is the single `publish` entry point of the system:
/// fulfillment, admin overrides and legacy display updates all flow through these hooks, and every state-affecting
/// mutation emits both the `update` and the `version` event since some observers only listen for one.
pub fn create_event_handlers(broadcaster: &Broadcaster, config: &ServerConfig) -> EventHandlers {
    let mut hooks = EventHooks::default();

    let b = broadcaster.clone();
    let base_url = config.public_base_url.clone();
    hooks.on_display_changed(move |event: DisplayChangedEvent| {
        let b = b.clone();
        let base_url = base_url.clone();
        Box::pin(async move {
            let payload = DisplayPayload::build(event.product.as_ref(), event.device.as_ref(), &base_url);
            b.publish_display_payload(&payload).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    let b = broadcaster.clone();
    hooks.on_display_state_updated(move |event: DisplayStateUpdatedEvent| {
        let b = b.clone();
        Box::pin(async move {
            let state = event.state;
            let payload = json!({
                "text": state.text,
                "qr": state.qr,
                "version": state.version,
                "updatedAt": state.updated_at,
            });
            b.publish(UPDATE_EVENT, &payload).await;
            b.publish(VERSION_EVENT, &json!({"version": state.version, "updatedAt": state.updated_at})).await;
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    hooks.on_sale_completed(move |event: SaleCompletedEvent| {
        Box::pin(async move {
            info!(
                "🧾️ Sale completed: session [{}], product '{}' ({}), display {}",
                event.order.session_id,
                event.product.name,
                event.order.amount,
                event.device.as_ref().map(|d| d.device_id.as_str()).unwrap_or("none"),
            );
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });

    EventHandlers::new(EVENT_BUFFER_SIZE, hooks)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    broadcaster: Broadcaster,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let stripe_api =
        StripeApi::new(config.stripe.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let fulfillment_api = FulfillmentApi::new(db.clone(), producers.clone());
        let catalog_api = CatalogApi::new(db.clone(), producers.clone());
        let device_config_api = DeviceConfigApi::new(db.clone(), config.public_base_url.clone());
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("q2b::access_log"))
            .app_data(web::Data::new(fulfillment_api))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(device_config_api))
            .app_data(web::Data::new(stripe_api.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .app_data(web::Data::new(options));
        let admin_scope = web::scope("/api/admin")
            .wrap(BasicAuthMiddlewareFactory::new(&config.admin))
            .service(CreateProductRoute::<SqliteDatabase>::new())
            .service(ListProductsRoute::<SqliteDatabase>::new())
            .service(AdminProductByShortRoute::<SqliteDatabase>::new())
            .service(AdminProductByIdRoute::<SqliteDatabase>::new())
            .service(PatchProductRoute::<SqliteDatabase>::new())
            .service(CreateDeviceRoute::<SqliteDatabase>::new())
            .service(ListDevicesRoute::<SqliteDatabase>::new())
            .service(PatchDeviceRoute::<SqliteDatabase>::new())
            .service(LinkDeviceRoute::<SqliteDatabase>::new())
            .service(UnlinkDeviceRoute::<SqliteDatabase>::new())
            .service(OverrideStatusRoute::<SqliteDatabase>::new());
        let public_scope = web::scope("/api/public")
            .service(PublicProductByShortRoute::<SqliteDatabase>::new())
            .service(PublicProductByIdRoute::<SqliteDatabase>::new())
            .service(PublicStatusByShortRoute::<SqliteDatabase>::new());
        let checkout_scope = web::scope("/api/checkout")
            .service(VerifyCheckoutRoute::<SqliteDatabase>::new())
            .service(CheckoutByShortRoute::<SqliteDatabase>::new())
            .service(CheckoutByIdRoute::<SqliteDatabase>::new());
        let stripe_scope = web::scope("/api/stripe").service(StripeWebhookRoute::<SqliteDatabase>::new());
        // The catch-all /api scope must come after the more specific ones.
        let api_scope = web::scope("/api")
            .service(DisplayConfigRoute::<SqliteDatabase>::new())
            .service(UpdateDisplayRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(sse_events)
            .service(websocket_entry)
            .service(admin_scope)
            .service(public_scope)
            .service(checkout_scope)
            .service(stripe_scope)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(70)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

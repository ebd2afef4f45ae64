use actix_web::{http::StatusCode, web, web::ServiceConfig};
use qr2buy_engine::{events::EventProducers, CatalogApi};

use crate::{
    admin_routes::ListProductsRoute,
    config::AdminAuthConfig,
    endpoint_tests::{helpers::get_request, mocks::MockStorefront},
    middleware::BasicAuthMiddlewareFactory,
};

fn configure_with(mock: MockStorefront) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let credentials = AdminAuthConfig::new("admin", "hunter2");
        cfg.service(
            web::scope("/admin")
                .wrap(BasicAuthMiddlewareFactory::new(&credentials))
                .service(ListProductsRoute::<MockStorefront>::new()),
        )
        .app_data(web::Data::new(CatalogApi::new(mock, EventProducers::default())));
    }
}

fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", base64::encode(format!("{user}:{pass}")))
}

#[actix_web::test]
async fn admin_routes_reject_missing_credentials() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("/admin/products", &[], configure_with(MockStorefront::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("unauthorized"));
}

#[actix_web::test]
async fn admin_routes_reject_wrong_credentials() {
    let _ = env_logger::try_init().ok();
    let auth = basic("admin", "wrong");
    let (status, _) = get_request(
        "/admin/products",
        &[("Authorization", auth.as_str())],
        configure_with(MockStorefront::new()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_routes_accept_correct_credentials() {
    let _ = env_logger::try_init().ok();
    let mut mock = MockStorefront::new();
    mock.expect_fetch_products().times(1).returning(|_| Ok(vec![]));
    let auth = basic("admin", "hunter2");
    let (status, body) =
        get_request("/admin/products", &[("Authorization", auth.as_str())], configure_with(mock)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

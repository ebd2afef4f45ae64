//! Basic-auth middleware for Actix Web.
//!
//! Wraps the admin scope and checks the `Authorization: Basic ...` header against the configured credentials before
//! any admin handler runs. Failures answer with a `WWW-Authenticate` challenge so browsers prompt for credentials.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::header,
    Error,
    HttpResponse,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::{auth::check_basic_auth, config::AdminAuthConfig};

const CHALLENGE: &str = "Basic realm=\"Admin\", charset=\"UTF-8\"";

pub struct BasicAuthMiddlewareFactory {
    config: AdminAuthConfig,
}

impl BasicAuthMiddlewareFactory {
    pub fn new(config: &AdminAuthConfig) -> Self {
        BasicAuthMiddlewareFactory { config: config.clone() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BasicAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = BasicAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BasicAuthMiddlewareService { config: self.config.clone(), service: Rc::new(service) }))
    }
}

pub struct BasicAuthMiddlewareService<S> {
    config: AdminAuthConfig,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BasicAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let config = self.config.clone();
        Box::pin(async move {
            trace!("🔐️ Checking admin credentials for {}", req.path());
            let supplied = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
            if check_basic_auth(supplied, &config) {
                trace!("🔐️ Admin credentials accepted");
                service.call(req).await
            } else {
                warn!("🔐️ Admin request to {} rejected: invalid or missing credentials", req.path());
                let response = HttpResponse::Unauthorized()
                    .insert_header((header::WWW_AUTHENTICATE, CHALLENGE))
                    .json(serde_json::json!({ "error": "unauthorized" }));
                Err(InternalError::from_response("unauthorized", response).into())
            }
        })
    }
}

use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};

use crate::{config::StripeConfig, CheckoutSession, NewCheckoutSession, StripeApiError};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut auth = HeaderValue::from_str(&bearer).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn ensure_configured(&self) -> Result<(), StripeApiError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(StripeApiError::NotConfigured)
        }
    }

    /// Retrieve a checkout session by id, with the payment intent expanded so that the OR-policy paid check can see
    /// its status.
    pub async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeApiError> {
        self.ensure_configured()?;
        let url = self.url(&format!("/checkout/sessions/{session_id}"));
        trace!("Retrieving checkout session {session_id}");
        let response = self
            .client
            .get(url)
            .query(&[("expand[]", "payment_intent")])
            .send()
            .await
            .map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<CheckoutSession>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }

    /// Create a new one-item payment session.
    pub async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSession, StripeApiError> {
        self.ensure_configured()?;
        let url = self.url("/checkout/sessions");
        debug!("Creating checkout session for '{}'", session.product_name);
        let response = self
            .client
            .post(url)
            .form(&session.form_params())
            .send()
            .await
            .map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            let created = response.json::<CheckoutSession>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))?;
            info!("Checkout session {} created", created.id);
            Ok(created)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status, message })
        }
    }
}

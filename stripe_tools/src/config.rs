use log::*;
use q2b_common::Secret;

const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    /// The signing secret for incoming webhooks. When absent, webhook signatures cannot be verified — the server
    /// decides whether that is acceptable for its environment.
    pub webhook_secret: Option<Secret<String>>,
    pub api_base: String,
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let secret_key = Secret::new(std::env::var("Q2B_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("Q2B_STRIPE_SECRET_KEY not set. Checkout and verification calls will fail.");
            String::default()
        }));
        let webhook_secret = std::env::var("Q2B_STRIPE_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if webhook_secret.is_none() {
            warn!("Q2B_STRIPE_WEBHOOK_SECRET not set. Incoming webhook signatures cannot be verified.");
        }
        let api_base =
            std::env::var("Q2B_STRIPE_API_BASE").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| DEFAULT_API_BASE.into());
        Self { secret_key, webhook_secret, api_base }
    }

    /// Whether an API key is available at all. Without one the provider is [`Unavailable`] to both gateway paths.
    pub fn is_configured(&self) -> bool {
        !self.secret_key.reveal().is_empty()
    }
}

use std::env;

use log::*;
use q2b_common::{parse_boolean_flag, Secret};
use stripe_tools::StripeConfig;

const DEFAULT_Q2B_HOST: &str = "127.0.0.1";
const DEFAULT_Q2B_PORT: u16 = 3001;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The externally visible base URL, used to build QR targets and checkout redirect URLs.
    pub public_base_url: String,
    /// When true, development fallbacks (unsigned webhooks, default admin credentials) are refused.
    pub production: bool,
    pub admin: AdminAuthConfig,
    pub stripe: StripeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_Q2B_HOST.to_string(),
            port: DEFAULT_Q2B_PORT,
            database_url: String::default(),
            public_base_url: format!("http://{DEFAULT_Q2B_HOST}:{DEFAULT_Q2B_PORT}"),
            production: false,
            admin: AdminAuthConfig::default(),
            stripe: StripeConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("Q2B_HOST").ok().unwrap_or_else(|| DEFAULT_Q2B_HOST.into());
        let port = env::var("Q2B_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for Q2B_PORT. {e} Using the default, {DEFAULT_Q2B_PORT}, instead.");
                    DEFAULT_Q2B_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_Q2B_PORT);
        let database_url = env::var("Q2B_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ Q2B_DATABASE_URL is not set. Please set it to the URL for the qr2buy database.");
            String::default()
        });
        let public_base_url = env::var("Q2B_PUBLIC_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                info!("🪛️ Q2B_PUBLIC_BASE_URL is not set. QR targets will point at http://{host}:{port}.");
                format!("http://{host}:{port}")
            });
        let production = parse_boolean_flag(env::var("Q2B_PRODUCTION").ok(), false);
        let admin = AdminAuthConfig::from_env(production);
        let stripe = StripeConfig::new_from_env_or_default();
        if production && stripe.webhook_secret.is_none() {
            warn!(
                "🚨️ Q2B_STRIPE_WEBHOOK_SECRET is not set while Q2B_PRODUCTION is enabled. Incoming webhooks will be \
                 rejected until a signing secret is configured."
            );
        }
        Self { host, port, database_url, public_base_url, production, admin, stripe }
    }
}

//-------------------------------------------  AdminAuthConfig  -------------------------------------------------------
/// Credentials for the admin basic-auth gate.
///
/// Outside production, missing credentials fall back to `admin`/`admin` with a warning so that local development
/// works out of the box. In production, missing credentials leave the gate closed: every admin request is rejected
/// until real credentials are configured.
#[derive(Clone, Debug, Default)]
pub struct AdminAuthConfig {
    pub username: String,
    pub password: Secret<String>,
}

impl AdminAuthConfig {
    pub fn new<S: Into<String>>(username: S, password: S) -> Self {
        Self { username: username.into(), password: Secret::new(password.into()) }
    }

    pub fn from_env(production: bool) -> Self {
        let username = env::var("Q2B_ADMIN_USER").ok().filter(|s| !s.is_empty());
        let password = env::var("Q2B_ADMIN_PASS").ok().filter(|s| !s.is_empty());
        match (username, password) {
            (Some(username), Some(password)) => Self { username, password: Secret::new(password) },
            _ if production => {
                error!(
                    "🚨️ Q2B_ADMIN_USER / Q2B_ADMIN_PASS are not set. The admin API will reject every request until \
                     credentials are configured."
                );
                Self::default()
            },
            _ => {
                warn!("🪛️ Q2B_ADMIN_USER / Q2B_ADMIN_PASS not set – using dev fallback admin/admin");
                Self::new("admin", "admin")
            },
        }
    }

    /// An empty configuration means the gate is closed, not open.
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && !self.password.reveal().is_empty()
    }
}

//-------------------------------------------  ServerOptions  ---------------------------------------------------------
/// A subset of the server configuration that route handlers need. Generally we try to keep this as small as possible,
/// and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub production: bool,
    pub public_base_url: String,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { production: config.production, public_base_url: config.public_base_url.clone() }
    }
}

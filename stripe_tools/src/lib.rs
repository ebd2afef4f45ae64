//! A minimal Stripe client for the qr2buy server.
//!
//! Covers exactly what the payment confirmation gateway needs: checkout session creation, session retrieval with
//! payment-intent expansion, and signed webhook event verification against the raw request bytes.
mod api;
mod config;
mod error;
mod webhook;

mod data_objects;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{
    CheckoutSession,
    CustomerDetails,
    Event,
    EventData,
    NewCheckoutSession,
    PaymentIntent,
    PaymentIntentRef,
    EVENT_CHECKOUT_ASYNC_PAYMENT_SUCCEEDED,
    EVENT_CHECKOUT_COMPLETED,
    EVENT_CHECKOUT_EXPIRED,
};
pub use error::StripeApiError;
pub use webhook::{parse_event, verify_signature, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER};

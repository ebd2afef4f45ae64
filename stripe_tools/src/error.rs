use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("No Stripe API key is configured")]
    NotConfigured,
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Malformed signature header: {0}")]
    SignatureHeader(String),
    #[error("Webhook signature does not match the payload")]
    SignatureMismatch,
    #[error("Webhook timestamp is outside the accepted tolerance")]
    TimestampOutOfTolerance,
}

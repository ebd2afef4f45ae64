use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use qr2buy_engine::traits::StorefrontError;
use stripe_tools::StripeApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Bad request. {0}")]
    BadRequest(String),
    #[error("Unauthorized. {0}")]
    Unauthorized(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("A required dependency is not available. {0}")]
    Unavailable(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StorefrontError> for ServerError {
    fn from(e: StorefrontError) -> Self {
        match e {
            StorefrontError::ProductNotFound(_) | StorefrontError::DeviceNotFound(_) | StorefrontError::OrderNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            StorefrontError::DuplicateShortId(_) | StorefrontError::DuplicateDeviceId(_) => Self::Conflict(e.to_string()),
            StorefrontError::InvalidDeviceSecret => Self::Unauthorized("invalid device secret".to_string()),
            StorefrontError::InvalidInput(msg) => Self::BadRequest(msg),
            StorefrontError::DatabaseError(msg) => Self::BackendError(msg),
        }
    }
}

impl From<StripeApiError> for ServerError {
    fn from(e: StripeApiError) -> Self {
        match e {
            StripeApiError::NotConfigured => Self::Unavailable("Stripe is not configured on this server".to_string()),
            StripeApiError::SignatureHeader(_) |
            StripeApiError::SignatureMismatch |
            StripeApiError::TimestampOutOfTolerance => Self::Unauthorized(e.to_string()),
            other => Self::BackendError(other.to_string()),
        }
    }
}

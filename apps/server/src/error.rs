use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub retryable: bool,
}

/// Application errors
///
/// A promotion that expires between being selected and being rendered is
/// not an error: callers display it for that one render.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Storage call timed out after {0:?}")]
    StorageTimeout(Duration),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Storage failures may succeed on retry; everything else will not
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_) | AppError::StorageTimeout(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PaymentVerification(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StorageTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::PaymentVerification(_) => "PaymentVerificationError",
            AppError::Storage(_) => "StorageError",
            AppError::StorageTimeout(_) => "StorageTimeout",
            AppError::Internal(_) => "InternalError",
        };

        if let AppError::Storage(e) = self {
            log::error!("Storage error: {}", e);
        }

        let response = ErrorResponse {
            error: ErrorDetail {
                error_type: error_type.to_string(),
                message: self.to_string(),
                retryable: self.is_retryable(),
            },
        };

        let mut builder = HttpResponse::build(self.status_code());
        if self.is_retryable() {
            builder.insert_header(("Retry-After", "1"));
        }
        builder.json(response)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

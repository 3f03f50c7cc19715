use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("No availability: {0}")]
    NoAvailability(String),

    #[error("Duplicate slot in batch: {0}")]
    DuplicateInBatch(String),

    #[error("Not owned: {0}")]
    NotOwned(String),

    #[error("A reschedule proposal is already pending")]
    ProposalInFlight,

    #[error("An open refund request already exists for this payment")]
    OpenRefundExists,

    #[error("Upstream call timed out: {0}")]
    UpstreamTimeout(String),

    #[error("External service error: {0}")]
    External(String),

    #[error("Payment error: {0}")]
    Payment(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, independent of the human message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "INTERNAL",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvalidTime(_) => "INVALID_TIME",
            AppError::NoAvailability(_) => "NO_AVAILABILITY",
            AppError::DuplicateInBatch(_) => "DUPLICATE_IN_BATCH",
            AppError::NotOwned(_) => "NOT_OWNED",
            AppError::ProposalInFlight => "PROPOSAL_IN_FLIGHT",
            AppError::OpenRefundExists => "OPEN_REFUND_EXISTS",
            AppError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            AppError::External(_) => "UPSTREAM_ERROR",
            AppError::Payment(_) => "PAYMENT_FAILED",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred".to_string())
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidState(ref msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidTime(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NoAvailability(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::DuplicateInBatch(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotOwned(ref msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::ProposalInFlight => (
                StatusCode::CONFLICT,
                "A reschedule proposal is already pending".to_string(),
            ),
            AppError::OpenRefundExists => (
                StatusCode::CONFLICT,
                "An open refund request already exists for this payment".to_string(),
            ),
            AppError::UpstreamTimeout(ref msg) => {
                tracing::warn!("Upstream timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, msg.clone())
            }
            AppError::External(ref msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Payment(ref msg) => (StatusCode::PAYMENT_REQUIRED, msg.clone()),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

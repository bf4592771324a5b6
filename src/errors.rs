use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Failures from the weather provider. Never retried at the source layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Transport failure or non-success HTTP status.
    #[error("Weather provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Body was not JSON or lacked the expected keys.
    #[error("Weather provider returned an invalid response: {0}")]
    ProviderResponseInvalid(String),
}

/// Failures handing a newsletter to the outgoing mail transport.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// Reasons a newsletter run did not happen.
#[derive(Debug, thiserror::Error)]
pub enum NewsletterError {
    #[error("A newsletter run is already in progress")]
    AlreadyRunning,

    #[error("Failed to load subscribers: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalServiceError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::ExternalServiceError(err.to_string())
    }
}

impl From<NewsletterError> for AppError {
    fn from(err: NewsletterError) -> Self {
        match err {
            NewsletterError::Database(e) => AppError::DatabaseError(e),
            already_running => AppError::BadRequest(already_running.to_string()),
        }
    }
}

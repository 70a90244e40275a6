//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::{LocalStoreError, RemoteStoreError};

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid auth: {0}")]
    Auth(#[from] tally_engine::Error),

    #[error("Local store error: {0}")]
    LocalStore(#[from] LocalStoreError),

    #[error("Remote store error: {0}")]
    RemoteStore(#[from] RemoteStoreError),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Auth(e) => {
                tracing::debug!(error = %e, "Rejected init data");
                (
                    StatusCode::FORBIDDEN,
                    "Invalid auth".to_string(),
                    Some(e.to_string()),
                )
            }
            AppError::LocalStore(e) => {
                tracing::error!("Local store error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Local store error".to_string(),
                    None,
                )
            }
            AppError::RemoteStore(e) => {
                tracing::warn!("Remote store error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Remote store unavailable".to_string(),
                    None,
                )
            }
            AppError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, reason.to_string(), None)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

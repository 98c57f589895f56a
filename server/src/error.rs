//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cellbox_engine::ErrorKind;
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] cellbox_engine::Error),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// HTTP status for an engine error category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Schema | ErrorKind::Type | ErrorKind::Query => StatusCode::BAD_REQUEST,
        ErrorKind::Precondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn category(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Schema => "schema violation",
        ErrorKind::Type => "type violation",
        ErrorKind::Precondition => "precondition failed",
        ErrorKind::NotFound => "not found",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Query => "invalid query",
        ErrorKind::Internal => "internal error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            AppError::Engine(e) => {
                let kind = e.kind();
                let status = status_for(kind);
                if kind == ErrorKind::Internal {
                    tracing::error!("Engine fault: {:?}", e);
                } else {
                    tracing::warn!("Engine error: {:?}", e);
                }
                (status, category(kind).to_string(), Some(e.to_string()))
            }
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

//! API error types and responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::GateError;

/// API error type
///
/// Refusals are deliberately uniform: the client never learns which
/// admission gate rejected it.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request")]
    Refused,

    #[error("Missing authentication")]
    MissingAuthentication,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Refused => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", "Invalid request".to_string()),
            ApiError::MissingAuthentication => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTHENTICATION",
                "Missing authentication".to_string(),
            ),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "Invalid token".to_string()),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Failed to generate token".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "Unreadable token request");
        ApiError::Refused
    }
}

//! Token guard for protected routes

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::api::error::ApiError;
use crate::api::extract::header_str;

pub const FINGERPRINT_HEADER: &str = "x-fingerprint";
pub const TOKEN_HEADER: &str = "x-app-token";

/// Fingerprint whose token was accepted by [`require_token`]
#[derive(Debug, Clone)]
pub struct AuthenticatedFingerprint(pub String);

/// Reject requests without a valid token for the presented fingerprint
pub async fn require_token(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = request.headers();
    let (fingerprint, token) = match (
        header_str(headers, FINGERPRINT_HEADER),
        header_str(headers, TOKEN_HEADER),
    ) {
        (Some(fp), Some(token)) => (fp.to_string(), token.to_string()),
        _ => return Err(ApiError::MissingAuthentication),
    };

    if !state.gatekeeper.validate(&token, &fingerprint).await {
        return Err(ApiError::InvalidToken);
    }

    request.extensions_mut().insert(AuthenticatedFingerprint(fingerprint));
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub fingerprint: String,
}

/// GET /api/session
pub async fn session(
    Extension(AuthenticatedFingerprint(fingerprint)): Extension<AuthenticatedFingerprint>,
) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        fingerprint,
    })
}

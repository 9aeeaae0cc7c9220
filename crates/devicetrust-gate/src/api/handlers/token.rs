//! Token issuance and server time
//!
//! Clients first read the server clock, then submit their fingerprint with
//! that timestamp to obtain a short-lived token bound to the fingerprint.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::AppState;
use crate::api::error::ApiError;
use crate::api::extract::{ClientIp, UserAgent};
use crate::core::TokenRequest;
use crate::token::IssuedToken;

/// Server clock as seen by the gate
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    /// RFC 3339 rendering of `timestamp`
    pub server_time: String,
    /// Seconds since epoch
    pub timestamp: i64,
}

/// GET /api/time
pub async fn server_time(State(state): State<Arc<AppState>>) -> Json<ServerTimeResponse> {
    let clock = state.gatekeeper.clock();

    Json(ServerTimeResponse {
        server_time: clock.now_utc().to_rfc3339(),
        timestamp: clock.now(),
    })
}

/// Exchange a fingerprint for a token
///
/// POST /api/app-token
///
/// Every refusal, including an unreadable body, yields the same
/// `400 {"error": "Invalid request"}`.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, ApiError> {
    let Json(request) = body?;

    state
        .gatekeeper
        .issue_if_valid(&request, &ip, &user_agent)
        .await?
        .map(Json)
        .ok_or(ApiError::Refused)
}

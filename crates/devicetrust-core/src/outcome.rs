//! Per-request admission outcomes handed to the outcome sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of request that produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    TokenRequest,
    TokenValidation,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::TokenRequest => write!(f, "TOKEN_REQUEST"),
            RequestKind::TokenValidation => write!(f, "TOKEN_VALIDATION"),
        }
    }
}

/// Why an admission gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Required request fields were missing
    MalformedRequest,
    TooManyFailedAttempts,
    InvalidFingerprint,
    RateLimitExceeded,
    InvalidTimestamp,
    InvalidToken,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::MalformedRequest => "Malformed request",
            FailureReason::TooManyFailedAttempts => "Too many failed attempts",
            FailureReason::InvalidFingerprint => "Invalid fingerprint",
            FailureReason::RateLimitExceeded => "Rate limit exceeded",
            FailureReason::InvalidTimestamp => "Invalid timestamp",
            FailureReason::InvalidToken => "Invalid token",
        };
        f.write_str(text)
    }
}

/// Immutable record of one admission attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub id: Uuid,
    pub fingerprint: String,
    pub device_id: String,
    pub ip_address: String,
    pub user_agent: String,
    pub request_kind: RequestKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    pub suspected_bot: bool,
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcome {
    /// Outcome of a successful request
    pub fn success(
        kind: RequestKind,
        fingerprint: impl Into<String>,
        device_id: impl Into<String>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint: fingerprint.into(),
            device_id: device_id.into(),
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            request_kind: kind,
            success: true,
            failure_reason: None,
            suspected_bot: false,
            timestamp,
        }
    }

    /// Outcome of a refused request
    ///
    /// Rate-limit refusals are tagged as suspected bot traffic.
    pub fn failure(
        kind: RequestKind,
        reason: FailureReason,
        fingerprint: impl Into<String>,
        device_id: impl Into<String>,
        ip_address: impl Into<String>,
        user_agent: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint: fingerprint.into(),
            device_id: device_id.into(),
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
            request_kind: kind,
            success: false,
            failure_reason: Some(reason),
            suspected_bot: reason == FailureReason::RateLimitExceeded,
            timestamp,
        }
    }
}

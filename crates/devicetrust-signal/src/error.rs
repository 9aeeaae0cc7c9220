//! Error types for bot signal providers

use thiserror::Error;

/// Result type for signal provider operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors that can occur while looking up a bot signal
///
/// None of these are fatal to verification; callers treat every error
/// as "no signal".
#[derive(Error, Debug)]
pub enum SignalError {
    /// Provider is not configured (no API key)
    #[error("Signal provider not configured")]
    NotConfigured,

    /// Empty or otherwise unusable visitor identifier
    #[error("Invalid visitor identifier: {0}")]
    InvalidVisitor(String),

    /// Request timed out
    #[error("Signal provider timed out")]
    Timeout,

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Provider answered with a non-success status
    #[error("Signal provider returned status {0}")]
    Status(u16),

    /// Response body could not be interpreted
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SignalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SignalError::Timeout
        } else if let Some(status) = err.status() {
            SignalError::Status(status.as_u16())
        } else if err.is_decode() {
            SignalError::InvalidResponse(err.to_string())
        } else {
            SignalError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SignalError {
    fn from(err: serde_json::Error) -> Self {
        SignalError::InvalidResponse(err.to_string())
    }
}

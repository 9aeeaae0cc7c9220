//! System errors surfaced by the gate

use thiserror::Error;

use crate::storage::StorageError;
use crate::token::TokenError;

/// Failures that are not admission refusals
///
/// A refusal is an expected outcome and is reported as `Ok(None)` or
/// `false`; a `GateError` means trust state could not be read or written,
/// or a token could not be signed.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Token failure: {0}")]
    Token(#[from] TokenError),
}

pub type Result<T> = std::result::Result<T, GateError>;

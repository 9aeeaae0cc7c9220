//! Storage abstraction for the gate
//!
//! Two collaborators live here:
//! - [`FingerprintStore`], the system of record for fingerprint trust state
//! - [`OutcomeSink`], which receives one [`RequestOutcome`] per admission attempt
//!
//! The in-memory backend is the default; the PostgreSQL backend is compiled
//! with the `postgres` feature and shares state between gate instances.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use devicetrust_core::{EnvironmentKey, FingerprintRecord, RequestOutcome};
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Fingerprint not found: {0}")]
    NotFound(String),

    #[error("Fingerprint already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Persistent fingerprint records
///
/// Implementations must be thread-safe and support concurrent access.
/// Read-modify-write consistency per fingerprint is provided by the caller.
#[async_trait]
pub trait FingerprintStore: Send + Sync + Debug {
    /// Look up the record for a fingerprint
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<FingerprintRecord>, StorageError>;

    /// Insert a new record; fails with `AlreadyExists` on a duplicate key
    async fn create(&self, record: FingerprintRecord) -> Result<(), StorageError>;

    /// Insert or fully replace a record
    async fn save(&self, record: FingerprintRecord) -> Result<(), StorageError>;

    /// Records sharing the environment tuple, other than `exclude`
    async fn find_similar(
        &self,
        environment: &EnvironmentKey,
        exclude: &str,
    ) -> Result<Vec<FingerprintRecord>, StorageError>;

    /// Records sharing the canvas digest or the audio digest, other than `exclude`
    async fn find_by_canvas_or_audio(
        &self,
        canvas: &str,
        audio: &str,
        exclude: &str,
    ) -> Result<Vec<FingerprintRecord>, StorageError>;
}

/// Receiver of per-request admission outcomes
///
/// The gate treats recording as fire-and-forget: an error is logged and
/// never changes the admission decision.
#[async_trait]
pub trait OutcomeSink: Send + Sync + Debug {
    async fn record(&self, outcome: RequestOutcome) -> Result<(), StorageError>;
}

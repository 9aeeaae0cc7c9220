//! In-memory storage backend
//!
//! Default storage implementation using in-memory hashmaps.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use devicetrust_core::{EnvironmentKey, FingerprintRecord, RequestOutcome};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use super::{FingerprintStore, OutcomeSink, StorageError};

/// In-memory fingerprint store and outcome log
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, FingerprintRecord>>,
    outcomes: RwLock<Vec<RequestOutcome>>,
}

fn poisoned<T>(err: PoisonError<T>) -> StorageError {
    StorageError::Database(format!("lock poisoned: {}", err))
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored fingerprint records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every recorded outcome, oldest first
    pub fn outcomes(&self) -> Vec<RequestOutcome> {
        self.outcomes.read().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<FingerprintRecord>, StorageError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(fingerprint).cloned())
    }

    async fn create(&self, record: FingerprintRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(poisoned)?;
        if records.contains_key(&record.fingerprint) {
            return Err(StorageError::AlreadyExists(record.fingerprint));
        }
        info!(fingerprint = %record.fingerprint, "Storing new fingerprint");
        records.insert(record.fingerprint.clone(), record);
        Ok(())
    }

    async fn save(&self, record: FingerprintRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(poisoned)?;
        debug!(
            fingerprint = %record.fingerprint,
            score = %record.consistency_score,
            "Saving fingerprint"
        );
        records.insert(record.fingerprint.clone(), record);
        Ok(())
    }

    async fn find_similar(
        &self,
        environment: &EnvironmentKey,
        exclude: &str,
    ) -> Result<Vec<FingerprintRecord>, StorageError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .filter(|r| r.fingerprint != exclude && r.matches_environment(environment))
            .cloned()
            .collect())
    }

    async fn find_by_canvas_or_audio(
        &self,
        canvas: &str,
        audio: &str,
        exclude: &str,
    ) -> Result<Vec<FingerprintRecord>, StorageError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .filter(|r| r.fingerprint != exclude && (r.canvas == canvas || r.audio == audio))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OutcomeSink for MemoryStore {
    async fn record(&self, outcome: RequestOutcome) -> Result<(), StorageError> {
        let mut outcomes = self.outcomes.write().map_err(poisoned)?;
        outcomes.push(outcome);
        Ok(())
    }
}

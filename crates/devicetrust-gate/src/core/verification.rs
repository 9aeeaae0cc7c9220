//! Fingerprint verification
//!
//! Entry point that decides whether a presented fingerprint is trustworthy:
//!
//! 1. Ask the bot signal provider (failures count as "no signal")
//! 2. Reject outright on a high-confidence bot signal, without touching the store
//! 3. Merge the signal into the attribute bundle and normalize it into a record
//! 4. Known fingerprint → consistency evaluation, persisted whatever the verdict
//! 5. New fingerprint → suspicion screening; a clean one is stored with the
//!    initial score
//!
//! Lookup, evaluation and write for one fingerprint run under a
//! per-fingerprint lock so concurrent attempts never overwrite a score with
//! a stale base.

use devicetrust_core::{
    evaluate_consistency, AttributeBundle, BotSignal, ConsistencyVerdict, FingerprintRecord,
    TrustPolicy, TrustScore,
};
use devicetrust_signal::BotSignalProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::suspicion::{SuspicionDetector, SuspicionReason};
use crate::clock::Clock;
use crate::storage::{FingerprintStore, StorageError};

/// Why verification refused a fingerprint
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// Fingerprint or attribute bundle absent
    MissingInput,

    /// The bot signal provider is confident this visitor is automated
    ProviderFlaggedBot { probability: f64, classification: String },

    /// Known fingerprint failed the consistency evaluation
    Inconsistent(ConsistencyVerdict),

    /// New fingerprint failed suspicion screening
    Suspicious(SuspicionReason),
}

/// Result of verifying one fingerprint
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Admitted {
        score: TrustScore,
        /// Whether a new record was created
        created: bool,
    },
    Rejected(RejectionReason),
}

impl VerificationOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, VerificationOutcome::Admitted { .. })
    }
}

type FingerprintLocks = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Verification orchestrator
pub struct Verifier {
    store: Arc<dyn FingerprintStore>,
    provider: Arc<dyn BotSignalProvider>,
    suspicion: SuspicionDetector,
    policy: TrustPolicy,
    clock: Arc<dyn Clock>,
    locks: FingerprintLocks,
}

impl Verifier {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        provider: Arc<dyn BotSignalProvider>,
        policy: TrustPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            suspicion: SuspicionDetector::new(store.clone(), &policy),
            store,
            provider,
            policy,
            clock,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    /// Verify a fingerprint and its attribute bundle, persisting the outcome
    ///
    /// Only storage failures are errors; every refusal is an `Ok` outcome.
    pub async fn verify(
        &self,
        fingerprint: &str,
        bundle: Option<AttributeBundle>,
    ) -> Result<VerificationOutcome, StorageError> {
        let mut bundle = match bundle {
            Some(bundle) if !fingerprint.is_empty() => bundle,
            _ => {
                debug!("Missing fingerprint or components");
                return Ok(VerificationOutcome::Rejected(RejectionReason::MissingInput));
            }
        };

        let signal = self.lookup_signal(fingerprint).await;
        if let Some(signal) = &signal {
            if signal.is_bot || signal.probability > self.policy.bot_confidence_threshold {
                warn!(
                    fingerprint = %fingerprint,
                    probability = signal.probability,
                    bot_type = %signal.classification,
                    "Bot signal provider identified visitor as bot"
                );
                return Ok(VerificationOutcome::Rejected(RejectionReason::ProviderFlaggedBot {
                    probability: signal.probability,
                    classification: signal.classification.clone(),
                }));
            }
            bundle.merge_signal(signal);
        }

        let now = self.clock.now();
        let incoming = match FingerprintRecord::from_bundle(fingerprint, &bundle, now) {
            Ok(record) => record,
            Err(e) => {
                debug!(fingerprint = %fingerprint, error = %e, "Could not normalize components");
                return Ok(VerificationOutcome::Rejected(RejectionReason::MissingInput));
            }
        };

        let lease = LockLease::acquire(&self.locks, fingerprint);
        let _guard = lease.lock.lock().await;
        self.verify_locked(incoming, now).await
    }

    async fn verify_locked(
        &self,
        incoming: FingerprintRecord,
        now: i64,
    ) -> Result<VerificationOutcome, StorageError> {
        if let Some(existing) = self.store.find_by_fingerprint(&incoming.fingerprint).await? {
            return self.check_consistency(existing, &incoming, now).await;
        }

        debug!(fingerprint = %incoming.fingerprint, "New fingerprint, screening for suspicious patterns");
        if let Some(reason) = self.suspicion.check(&incoming).await? {
            warn!(fingerprint = %incoming.fingerprint, reason = %reason, "Suspicious new fingerprint");
            return Ok(VerificationOutcome::Rejected(RejectionReason::Suspicious(reason)));
        }

        let mut record = incoming;
        record.consistency_score = TrustScore::new(i64::from(self.policy.initial_score));
        record.first_seen_at = now;
        record.last_seen_at = now;
        let score = record.consistency_score;

        match self.store.create(record.clone()).await {
            Ok(()) => {
                info!(fingerprint = %record.fingerprint, score = %score, "Admitted new fingerprint");
                Ok(VerificationOutcome::Admitted { score, created: true })
            }
            // Another gate instance stored it first; judge against that record
            Err(StorageError::AlreadyExists(_)) => {
                match self.store.find_by_fingerprint(&record.fingerprint).await? {
                    Some(existing) => self.check_consistency(existing, &record, now).await,
                    None => Err(StorageError::NotFound(record.fingerprint)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn check_consistency(
        &self,
        existing: FingerprintRecord,
        incoming: &FingerprintRecord,
        now: i64,
    ) -> Result<VerificationOutcome, StorageError> {
        let outcome = evaluate_consistency(existing, incoming, &self.policy, now);
        self.store.save(outcome.record).await?;

        match outcome.verdict {
            ConsistencyVerdict::Admitted { score } => {
                debug!(fingerprint = %incoming.fingerprint, score = %score, "Consistent fingerprint");
                Ok(VerificationOutcome::Admitted { score, created: false })
            }
            verdict => {
                warn!(
                    fingerprint = %incoming.fingerprint,
                    verdict = ?verdict,
                    "Fingerprint failed consistency check"
                );
                Ok(VerificationOutcome::Rejected(RejectionReason::Inconsistent(verdict)))
            }
        }
    }

    async fn lookup_signal(&self, fingerprint: &str) -> Option<BotSignal> {
        match self.provider.lookup(fingerprint).await {
            Ok(signal) => signal,
            Err(e) => {
                info!(
                    fingerprint = %fingerprint,
                    provider = self.provider.description(),
                    error = %e,
                    "Bot signal unavailable, continuing without it"
                );
                None
            }
        }
    }

    /// Restore the initial score and clear bot fields; `false` if unknown
    pub async fn reset_trust(&self, fingerprint: &str) -> Result<bool, StorageError> {
        let lease = LockLease::acquire(&self.locks, fingerprint);
        let _guard = lease.lock.lock().await;
        match self.store.find_by_fingerprint(fingerprint).await? {
            Some(mut record) => {
                record.consistency_score = TrustScore::new(i64::from(self.policy.initial_score));
                record.is_bot = false;
                record.bot_probability = 0.0;
                record.bot_type.clear();
                self.store.save(record).await?;
                info!(fingerprint = %fingerprint, "Trust reset");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Handle on one fingerprint's lock
///
/// Dropping the last lease removes the map entry, including when the
/// owning future is cancelled mid-await.
struct LockLease<'a> {
    locks: &'a FingerprintLocks,
    fingerprint: String,
    lock: Arc<AsyncMutex<()>>,
}

impl<'a> LockLease<'a> {
    fn acquire(locks: &'a FingerprintLocks, fingerprint: &str) -> Self {
        let lock = locks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(fingerprint.to_string())
            .or_default()
            .clone();
        Self {
            locks,
            fingerprint: fingerprint.to_string(),
            lock,
        }
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.fingerprint);
        }
    }
}

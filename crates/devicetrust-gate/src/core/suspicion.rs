//! Screening for fingerprints with no stored history
//!
//! Without a record to compare against, a new fingerprint is judged by
//! cross-fingerprint patterns in the store and by the bot-signature heuristic.
//! Checks run in order and the first hit decides.

use devicetrust_core::{detect_bot_signature, BotSignature, FingerprintRecord, TrustPolicy};
use std::fmt;
use std::sync::Arc;

use crate::storage::{FingerprintStore, StorageError};

/// Why a new fingerprint was considered suspicious
#[derive(Debug, Clone, PartialEq)]
pub enum SuspicionReason {
    /// Bot probability above the suspicion threshold
    HighBotProbability(f64),

    /// Another fingerprint uses the same user agent, platform, screen,
    /// timezone and language
    EnvironmentCollision { other: String },

    /// Another fingerprint has the same canvas or audio digest
    AnchorReuse { other: String },

    /// Record attributes look automated
    BotSignature(BotSignature),
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspicionReason::HighBotProbability(p) => write!(f, "bot probability {:.2}", p),
            SuspicionReason::EnvironmentCollision { other } => {
                write!(f, "environment shared with fingerprint {}", other)
            }
            SuspicionReason::AnchorReuse { other } => {
                write!(f, "canvas or audio digest shared with fingerprint {}", other)
            }
            SuspicionReason::BotSignature(sig) => write!(f, "bot signature {:?}", sig),
        }
    }
}

/// Cross-fingerprint checks for never-seen fingerprints
#[derive(Debug, Clone)]
pub struct SuspicionDetector {
    store: Arc<dyn FingerprintStore>,
    suspicious_bot_probability: f64,
}

impl SuspicionDetector {
    pub fn new(store: Arc<dyn FingerprintStore>, policy: &TrustPolicy) -> Self {
        Self {
            store,
            suspicious_bot_probability: policy.suspicious_bot_probability,
        }
    }

    /// First reason `candidate` is suspicious, or `None` if it looks legitimate
    pub async fn check(&self, candidate: &FingerprintRecord) -> Result<Option<SuspicionReason>, StorageError> {
        if candidate.bot_probability > self.suspicious_bot_probability {
            return Ok(Some(SuspicionReason::HighBotProbability(candidate.bot_probability)));
        }

        let similar = self
            .store
            .find_similar(&candidate.environment(), &candidate.fingerprint)
            .await?;
        if let Some(other) = similar.into_iter().next() {
            return Ok(Some(SuspicionReason::EnvironmentCollision {
                other: other.fingerprint,
            }));
        }

        let reused = self
            .store
            .find_by_canvas_or_audio(&candidate.canvas, &candidate.audio, &candidate.fingerprint)
            .await?;
        if let Some(other) = reused.into_iter().next() {
            return Ok(Some(SuspicionReason::AnchorReuse {
                other: other.fingerprint,
            }));
        }

        Ok(detect_bot_signature(candidate).map(SuspicionReason::BotSignature))
    }

    pub async fn is_suspicious(&self, candidate: &FingerprintRecord) -> Result<bool, StorageError> {
        Ok(self.check(candidate).await?.is_some())
    }
}

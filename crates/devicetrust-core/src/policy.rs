//! Trust policy constants

use serde::{Deserialize, Serialize};

/// Thresholds and score adjustments used by the evaluators
///
/// Defaults reproduce the deployed policy; every value can be overridden
/// through configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustPolicy {
    /// Score assigned to a newly admitted fingerprint
    pub initial_score: u8,

    /// Minimum score for a known fingerprint to be admitted
    pub admit_threshold: u8,

    /// Deduction when the fingerprint is flagged as a bot
    pub bot_penalty: u8,

    /// Deduction when the canvas or audio anchor changes
    pub anchor_mismatch_penalty: u8,

    /// Deduction when too many rarely-changing attributes drift
    pub hardware_drift_penalty: u8,

    /// Increment after a clean comparison
    pub clean_visit_reward: u8,

    /// Number of rarely-changing attributes allowed to differ
    pub max_hardware_drift: usize,

    /// Bot probability above which a new fingerprint is suspicious
    pub suspicious_bot_probability: f64,

    /// Provider probability above which a visitor is classified as a bot
    pub bot_confidence_threshold: f64,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            initial_score: 100,
            admit_threshold: 50,
            bot_penalty: 50,
            anchor_mismatch_penalty: 20,
            hardware_drift_penalty: 10,
            clean_visit_reward: 1,
            max_hardware_drift: 2,
            suspicious_bot_probability: 0.7,
            bot_confidence_threshold: 0.8,
        }
    }
}

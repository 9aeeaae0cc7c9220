//! Consistency evaluation for fingerprints with stored history
//!
//! Decides whether an incoming attribute set still describes the same
//! physical device as the stored record, tolerating natural drift
//! (driver or OS updates) while rejecting spoofed or swapped environments.
//!
//! Rules are applied in order and the first failing rule decides:
//!
//! 1. Bot flag (stored or newly signalled) → `bot_penalty`
//! 2. Canvas or audio anchor changed → `anchor_mismatch_penalty`
//! 3. More than `max_hardware_drift` rarely-changing attributes changed →
//!    `hardware_drift_penalty`
//! 4. Otherwise `clean_visit_reward`, admitted only at or above `admit_threshold`
//!
//! Every branch returns the updated record; the caller persists it whatever
//! the verdict.

use crate::policy::TrustPolicy;
use crate::record::{FingerprintRecord, TrustScore};

/// Result of comparing an incoming fingerprint with its history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyVerdict {
    /// Clean comparison with a score at or above the threshold
    Admitted { score: TrustScore },

    /// The record is flagged as a bot
    FlaggedBot { score: TrustScore },

    /// Canvas and/or audio digest changed
    AnchorMismatch {
        canvas_changed: bool,
        audio_changed: bool,
        score: TrustScore,
    },

    /// Too many rarely-changing attributes changed at once
    HardwareDrift {
        changed: Vec<&'static str>,
        score: TrustScore,
    },

    /// Clean comparison, but accumulated penalties keep the score below threshold
    LowTrust { score: TrustScore },
}

impl ConsistencyVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, ConsistencyVerdict::Admitted { .. })
    }

    /// Score after this evaluation
    pub fn score(&self) -> TrustScore {
        match self {
            ConsistencyVerdict::Admitted { score }
            | ConsistencyVerdict::FlaggedBot { score }
            | ConsistencyVerdict::AnchorMismatch { score, .. }
            | ConsistencyVerdict::HardwareDrift { score, .. }
            | ConsistencyVerdict::LowTrust { score } => *score,
        }
    }
}

/// Verdict plus the record to persist
#[derive(Debug, Clone, PartialEq)]
pub struct ConsistencyOutcome {
    pub verdict: ConsistencyVerdict,
    pub record: FingerprintRecord,
}

impl ConsistencyOutcome {
    pub fn is_admitted(&self) -> bool {
        self.verdict.is_admitted()
    }
}

/// List the rarely-changing, hardware-proximate attributes that differ
pub fn hardware_drift(existing: &FingerprintRecord, incoming: &FingerprintRecord) -> Vec<&'static str> {
    let pairs: [(&'static str, &str, &str); 6] = [
        ("webgl_renderer", existing.webgl_renderer.as_str(), incoming.webgl_renderer.as_str()),
        ("webgl_vendor", existing.webgl_vendor.as_str(), incoming.webgl_vendor.as_str()),
        ("cpu_cores", existing.cpu_cores.as_str(), incoming.cpu_cores.as_str()),
        (
            "hardware_concurrency",
            existing.hardware_concurrency.as_str(),
            incoming.hardware_concurrency.as_str(),
        ),
        ("color_depth", existing.color_depth.as_str(), incoming.color_depth.as_str()),
        ("pixel_ratio", existing.pixel_ratio.as_str(), incoming.pixel_ratio.as_str()),
    ];

    pairs
        .iter()
        .filter(|(_, old, new)| old != new)
        .map(|(name, _, _)| *name)
        .collect()
}

/// Compare `incoming` with its stored history and produce the updated record
pub fn evaluate_consistency(
    mut existing: FingerprintRecord,
    incoming: &FingerprintRecord,
    policy: &TrustPolicy,
    now: i64,
) -> ConsistencyOutcome {
    existing.touch(now);

    if incoming.has_bot_signal() {
        existing.absorb_bot_signal(incoming);
    }

    if existing.is_bot {
        existing.consistency_score = existing.consistency_score.penalize(policy.bot_penalty);
        return ConsistencyOutcome {
            verdict: ConsistencyVerdict::FlaggedBot {
                score: existing.consistency_score,
            },
            record: existing,
        };
    }

    let canvas_changed = existing.canvas != incoming.canvas;
    let audio_changed = existing.audio != incoming.audio;
    if canvas_changed || audio_changed {
        existing.consistency_score = existing
            .consistency_score
            .penalize(policy.anchor_mismatch_penalty);
        return ConsistencyOutcome {
            verdict: ConsistencyVerdict::AnchorMismatch {
                canvas_changed,
                audio_changed,
                score: existing.consistency_score,
            },
            record: existing,
        };
    }

    let changed = hardware_drift(&existing, incoming);
    if changed.len() > policy.max_hardware_drift {
        existing.consistency_score = existing
            .consistency_score
            .penalize(policy.hardware_drift_penalty);
        return ConsistencyOutcome {
            verdict: ConsistencyVerdict::HardwareDrift {
                changed,
                score: existing.consistency_score,
            },
            record: existing,
        };
    }

    existing.consistency_score = existing.consistency_score.reward(policy.clean_visit_reward);
    let score = existing.consistency_score;
    let verdict = if score.value() >= policy.admit_threshold {
        ConsistencyVerdict::Admitted { score }
    } else {
        ConsistencyVerdict::LowTrust { score }
    };

    ConsistencyOutcome {
        verdict,
        record: existing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{keys, AttributeBundle};

    fn device() -> AttributeBundle {
        AttributeBundle::new()
            .with(keys::USER_AGENT, "Mozilla/5.0 (X11; Linux x86_64)")
            .with(keys::CANVAS, "c1")
            .with(keys::AUDIO, "a1")
            .with(keys::WEBGL_RENDERER, "ANGLE (Intel)")
            .with(keys::WEBGL_VENDOR, "Intel")
            .with(keys::CPU_CORES, "8")
            .with(keys::HARDWARE_CONCURRENCY, "8")
            .with(keys::COLOR_DEPTH, "24")
            .with(keys::PIXEL_RATIO, "1")
    }

    fn record(bundle: &AttributeBundle, now: i64) -> FingerprintRecord {
        FingerprintRecord::from_bundle("fp1", bundle, now).unwrap()
    }

    #[test]
    fn test_identical_visit_is_admitted_and_capped() {
        let existing = record(&device(), 100);
        let incoming = record(&device(), 101);

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert!(outcome.is_admitted());
        assert_eq!(outcome.record.consistency_score, TrustScore::MAX);
        assert_eq!(outcome.record.last_seen_at, 101);
        assert_eq!(outcome.record.first_seen_at, 100);
    }

    #[test]
    fn test_canvas_change_deducts_twenty() {
        let existing = record(&device(), 100);
        let incoming = record(&device().with(keys::CANVAS, "c2"), 101);

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert!(!outcome.is_admitted());
        assert_eq!(outcome.record.consistency_score.value(), 80);
        assert_eq!(
            outcome.verdict,
            ConsistencyVerdict::AnchorMismatch {
                canvas_changed: true,
                audio_changed: false,
                score: TrustScore::new(80),
            }
        );
    }

    #[test]
    fn test_anchor_penalty_floors_at_zero() {
        let mut existing = record(&device(), 100);
        existing.consistency_score = TrustScore::new(15);
        let incoming = record(&device().with(keys::AUDIO, "a9"), 101);

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert_eq!(outcome.record.consistency_score, TrustScore::MIN);
    }

    #[test]
    fn test_two_drifted_attributes_are_tolerated() {
        let existing = record(&device(), 100);
        let incoming = record(
            &device()
                .with(keys::WEBGL_RENDERER, "ANGLE (Intel) v2")
                .with(keys::PIXEL_RATIO, "2"),
            101,
        );

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert!(outcome.is_admitted());
    }

    #[test]
    fn test_three_drifted_attributes_are_rejected() {
        let mut existing = record(&device(), 100);
        existing.consistency_score = TrustScore::new(90);
        let incoming = record(
            &device()
                .with(keys::WEBGL_RENDERER, "SomethingElse")
                .with(keys::CPU_CORES, "4")
                .with(keys::COLOR_DEPTH, "30"),
            101,
        );

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert!(!outcome.is_admitted());
        assert_eq!(outcome.record.consistency_score.value(), 80);
        match outcome.verdict {
            ConsistencyVerdict::HardwareDrift { changed, .. } => {
                assert_eq!(changed, vec!["webgl_renderer", "cpu_cores", "color_depth"]);
            }
            other => panic!("Expected HardwareDrift, got {:?}", other),
        }
    }

    #[test]
    fn test_non_hardware_changes_do_not_count_as_drift() {
        let existing = record(&device(), 100);
        let incoming = record(
            &device()
                .with(keys::TIMEZONE, "Europe/Paris")
                .with(keys::LANGUAGE, "fr-FR")
                .with(keys::DEVICE_MEMORY, "16")
                .with(keys::FONTS, "digest-2"),
            101,
        );

        assert!(hardware_drift(&existing, &incoming).is_empty());
    }

    #[test]
    fn test_incoming_bot_signal_flags_record() {
        let existing = record(&device(), 100);
        let incoming = record(
            &device()
                .with(keys::IS_BOT, true)
                .with(keys::BOT_PROBABILITY, 0.93)
                .with(keys::BOT_TYPE, "automation"),
            101,
        );

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert!(!outcome.is_admitted());
        assert!(outcome.record.is_bot);
        assert_eq!(outcome.record.bot_type, "automation");
        assert_eq!(outcome.record.consistency_score.value(), 50);
    }

    #[test]
    fn test_stored_bot_flag_rejects_without_new_signal() {
        let mut existing = record(&device(), 100);
        existing.is_bot = true;
        existing.consistency_score = TrustScore::new(30);
        let incoming = record(&device(), 101);

        let outcome = evaluate_consistency(existing, &incoming, &TrustPolicy::default(), 101);

        assert!(matches!(outcome.verdict, ConsistencyVerdict::FlaggedBot { .. }));
        assert_eq!(outcome.record.consistency_score, TrustScore::MIN);
    }

    #[test]
    fn test_low_score_stays_rejected_until_recovered() {
        let mut existing = record(&device(), 100);
        existing.consistency_score = TrustScore::new(48);
        let policy = TrustPolicy::default();

        let first = evaluate_consistency(existing, &record(&device(), 101), &policy, 101);
        assert_eq!(first.verdict, ConsistencyVerdict::LowTrust { score: TrustScore::new(49) });

        let second = evaluate_consistency(first.record, &record(&device(), 102), &policy, 102);
        assert_eq!(second.verdict, ConsistencyVerdict::Admitted { score: TrustScore::new(50) });
    }
}

//! Integration Tests for the Device Trust Gate
//!
//! These tests drive the gatekeeper the way the HTTP layer does:
//! - First visit admission and record creation
//! - Consistency scoring on return visits
//! - Refusal of crawlers with no history
//! - Bot signal provider influence on admission
//! - Trust reset after a score has collapsed

use std::sync::Arc;

use devicetrust_core::attributes::keys;
use devicetrust_core::{AttributeBundle, BotSignal, FailureReason, RequestKind};
use devicetrust_gate::storage::FingerprintStore;
use devicetrust_gate::{Gatekeeper, ManualClock, MemoryStore, TokenIssuer, TokenRequest};
use devicetrust_signal::handlers::StaticSignalProvider;
use devicetrust_signal::BotSignalProvider;

// =============================================================================
// Test Helpers
// =============================================================================

const NOW: i64 = 1_717_171_717;
const SECRET: &[u8] = b"integration-secret-0123456789abcdef";

struct Harness {
    gate: Gatekeeper,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    harness_with_provider(None)
}

fn harness_with_provider(provider: Option<Arc<dyn BotSignalProvider>>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(NOW));

    let mut builder = Gatekeeper::builder(TokenIssuer::new(SECRET, 300))
        .memory_store(store.clone())
        .clock(clock.clone());
    if let Some(provider) = provider {
        builder = builder.provider(provider);
    }

    Harness {
        gate: builder.build(),
        store,
        clock,
    }
}

fn device(canvas: &str) -> AttributeBundle {
    AttributeBundle::new()
        .with(keys::CANVAS, canvas)
        .with(keys::AUDIO, "a1")
        .with(
            keys::USER_AGENT,
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 Safari/605.1.15",
        )
        .with(keys::CPU_CORES, "4")
}

async fn score(store: &MemoryStore, fingerprint: &str) -> Option<u8> {
    store
        .find_by_fingerprint(fingerprint)
        .await
        .unwrap()
        .map(|r| r.consistency_score.value())
}

// =============================================================================
// End-to-End Scenario
// =============================================================================

#[tokio::test]
async fn test_device_lifecycle() {
    let h = harness();

    // First visit: admitted, record stored at the initial score
    let token = h
        .gate
        .issue_if_valid(&TokenRequest::new("dev-1", "fp1", NOW, device("c1")), "198.51.100.4", "Safari")
        .await
        .unwrap()
        .expect("first visit should be admitted");
    assert_eq!(token.fingerprint, "fp1");
    assert!(h.gate.validate(&token.token, "fp1").await);
    assert_eq!(score(&h.store, "fp1").await, Some(100));

    // Identical bundle one second later: consistent, score stays at the ceiling
    h.clock.advance(1);
    let again = h
        .gate
        .issue_if_valid(
            &TokenRequest::new("dev-1", "fp1", NOW + 1, device("c1")),
            "198.51.100.4",
            "Safari",
        )
        .await
        .unwrap();
    assert!(again.is_some());
    assert_eq!(score(&h.store, "fp1").await, Some(100));

    // Canvas changed: refused and penalized
    let spoofed = h
        .gate
        .issue_if_valid(
            &TokenRequest::new("dev-1", "fp1", NOW + 1, device("c2")),
            "198.51.100.4",
            "Safari",
        )
        .await
        .unwrap();
    assert!(spoofed.is_none());
    assert_eq!(score(&h.store, "fp1").await, Some(80));

    // Crawler without history: refused, nothing stored
    let crawler = AttributeBundle::new()
        .with(keys::CANVAS, "c-bot")
        .with(keys::AUDIO, "a-bot")
        .with(keys::USER_AGENT, "Googlebot/2.1 (+http://www.google.com/bot.html)");
    let refused = h
        .gate
        .issue_if_valid(&TokenRequest::new("dev-bot", "fp-bot", NOW + 1, crawler), "66.249.66.1", "Googlebot/2.1")
        .await
        .unwrap();
    assert!(refused.is_none());
    assert_eq!(score(&h.store, "fp-bot").await, None);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn test_outcome_log_matches_admissions() {
    let h = harness();

    h.gate
        .issue_if_valid(&TokenRequest::new("dev-1", "fp1", NOW, device("c1")), "ip", "ua")
        .await
        .unwrap();
    h.gate
        .issue_if_valid(&TokenRequest::new("dev-1", "fp1", NOW, device("c2")), "ip", "ua")
        .await
        .unwrap();

    let outcomes = h.store.outcomes();
    assert_eq!(outcomes.len(), 2);

    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].request_kind, RequestKind::TokenRequest);
    assert_eq!(outcomes[0].fingerprint, "fp1");
    assert_eq!(outcomes[0].device_id, "dev-1");

    assert!(!outcomes[1].success);
    assert_eq!(outcomes[1].failure_reason, Some(FailureReason::InvalidFingerprint));
    assert!(!outcomes[1].suspected_bot);
}

#[tokio::test]
async fn test_score_recovers_one_point_per_clean_visit() {
    let h = harness();
    let request = |canvas: &str| TokenRequest::new("dev-1", "fp1", NOW, device(canvas));

    h.gate.issue_if_valid(&request("c1"), "ip", "ua").await.unwrap();
    h.gate.issue_if_valid(&request("c2"), "ip", "ua").await.unwrap();
    assert_eq!(score(&h.store, "fp1").await, Some(80));

    // The stored anchors are not replaced by a refused bundle
    assert!(h.gate.issue_if_valid(&request("c1"), "ip", "ua").await.unwrap().is_some());
    assert_eq!(score(&h.store, "fp1").await, Some(81));
}

// =============================================================================
// Bot Signal Provider
// =============================================================================

#[tokio::test]
async fn test_provider_bot_verdict_refuses() {
    let provider = StaticSignalProvider::new().with_signal("fp1", BotSignal::new(0.95, "bad", 0.8));
    let h = harness_with_provider(Some(Arc::new(provider)));

    let token = h
        .gate
        .issue_if_valid(&TokenRequest::new("dev-1", "fp1", NOW, device("c1")), "ip", "ua")
        .await
        .unwrap();

    assert!(token.is_none());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_provider_outage_does_not_block() {
    let h = harness_with_provider(Some(Arc::new(StaticSignalProvider::failing())));

    let token = h
        .gate
        .issue_if_valid(&TokenRequest::new("dev-1", "fp1", NOW, device("c1")), "ip", "ua")
        .await
        .unwrap();

    assert!(token.is_some());
}

#[tokio::test]
async fn test_provider_signal_is_stored() {
    let provider = StaticSignalProvider::new().with_signal("fp1", BotSignal::new(0.2, "good", 0.8));
    let h = harness_with_provider(Some(Arc::new(provider)));

    h.gate
        .issue_if_valid(&TokenRequest::new("dev-1", "fp1", NOW, device("c1")), "ip", "ua")
        .await
        .unwrap()
        .expect("low probability should be admitted");

    let record = h.store.find_by_fingerprint("fp1").await.unwrap().unwrap();
    assert!(!record.is_bot);
    assert_eq!(record.bot_probability, 0.2);
    assert_eq!(record.bot_type, "good");
}

// =============================================================================
// Trust Reset
// =============================================================================

#[tokio::test]
async fn test_reset_trust_readmits_collapsed_fingerprint() {
    let h = harness();
    let request = |canvas: &str| TokenRequest::new("dev-1", "fp1", NOW, device(canvas));

    h.gate.issue_if_valid(&request("c1"), "ip", "ua").await.unwrap();
    for _ in 0..3 {
        assert!(h.gate.issue_if_valid(&request("c2"), "ip", "ua").await.unwrap().is_none());
    }
    assert_eq!(score(&h.store, "fp1").await, Some(40));

    assert!(h.gate.reset_trust("fp1").await.unwrap());
    assert_eq!(score(&h.store, "fp1").await, Some(100));
    assert_eq!(h.gate.tracker().failure_count("fp1", NOW), 0);

    assert!(h.gate.issue_if_valid(&request("c1"), "ip", "ua").await.unwrap().is_some());
}

#[tokio::test]
async fn test_reset_unknown_fingerprint() {
    let h = harness();
    assert!(!h.gate.reset_trust("never-seen").await.unwrap());
}

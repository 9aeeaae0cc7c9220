//! Admission control and token issuance
//!
//! A token request passes four gates in order, stopping at the first failure:
//!
//! 1. **Lockout**: too many failed attempts inside the failure window
//! 2. **Verification**: the fingerprint must be trusted
//! 3. **Rate limit**: sliding window of requests per fingerprint
//! 4. **Freshness**: the claimed timestamp must be close to server time
//!
//! Every refusal is reported to the outcome sink with its reason and, except
//! for the lockout gate, counts as a failed attempt. Callers only see
//! "token" or "no token"; reasons stay in the outcome log.

use devicetrust_core::{AttributeBundle, FailureReason, RequestKind, RequestOutcome, TrustPolicy};
use devicetrust_signal::{BotSignalProvider, DisabledProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::Result;
use super::verification::{VerificationOutcome, Verifier};
use crate::clock::{Clock, SystemClock};
use crate::storage::{FingerprintStore, MemoryStore, OutcomeSink};
use crate::token::{IssuedToken, TokenIssuer};
use crate::tracker::{AttemptTracker, WindowLimit};

/// Token request as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Client's claimed time, seconds since epoch
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub components: Option<AttributeBundle>,
}

impl TokenRequest {
    pub fn new(
        device_id: impl Into<String>,
        fingerprint: impl Into<String>,
        timestamp: i64,
        components: AttributeBundle,
    ) -> Self {
        Self {
            device_id: Some(device_id.into()),
            fingerprint: Some(fingerprint.into()),
            timestamp: Some(timestamp),
            components: Some(components),
        }
    }
}

/// Who is asking, as seen by the transport
#[derive(Debug, Clone, Copy)]
struct Caller<'a> {
    fingerprint: &'a str,
    device_id: &'a str,
    ip: &'a str,
    user_agent: &'a str,
}

/// Admission controller and token validator
pub struct Gatekeeper {
    verifier: Verifier,
    tracker: AttemptTracker,
    issuer: TokenIssuer,
    sink: Arc<dyn OutcomeSink>,
    clock: Arc<dyn Clock>,
    timestamp_tolerance: i64,
}

impl Gatekeeper {
    pub fn builder(issuer: TokenIssuer) -> GatekeeperBuilder {
        GatekeeperBuilder::new(issuer)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn tracker(&self) -> &AttemptTracker {
        &self.tracker
    }

    /// Run the admission gates and mint a token if all pass
    ///
    /// `Ok(None)` is a refusal. `Err` is reserved for storage and signing
    /// failures.
    pub async fn issue_if_valid(
        &self,
        request: &TokenRequest,
        client_ip: &str,
        user_agent: &str,
    ) -> Result<Option<IssuedToken>> {
        let now = self.clock.now();

        let (fingerprint, device_id, timestamp) = match (
            non_empty(&request.fingerprint),
            non_empty(&request.device_id),
            request.timestamp,
        ) {
            (Some(fp), Some(device), Some(ts)) => (fp, device, ts),
            _ => {
                let caller = Caller {
                    fingerprint: request.fingerprint.as_deref().unwrap_or_default(),
                    device_id: request.device_id.as_deref().unwrap_or_default(),
                    ip: client_ip,
                    user_agent,
                };
                self.refuse(RequestKind::TokenRequest, FailureReason::MalformedRequest, caller, false)
                    .await;
                return Ok(None);
            }
        };

        let caller = Caller {
            fingerprint,
            device_id,
            ip: client_ip,
            user_agent,
        };
        info!(ip = %client_ip, user_agent = %user_agent, device_id = %device_id, "Token request");

        if self.tracker.is_locked_out(fingerprint, now) {
            self.refuse(RequestKind::TokenRequest, FailureReason::TooManyFailedAttempts, caller, false)
                .await;
            return Ok(None);
        }

        let verification = self
            .verifier
            .verify(fingerprint, request.components.clone())
            .await?;
        if let VerificationOutcome::Rejected(reason) = &verification {
            debug!(fingerprint = %fingerprint, reason = ?reason, "Verification rejected");
            self.refuse(RequestKind::TokenRequest, FailureReason::InvalidFingerprint, caller, true)
                .await;
            return Ok(None);
        }

        if !self.tracker.check_and_increment_rate(fingerprint, now) {
            self.refuse(RequestKind::TokenRequest, FailureReason::RateLimitExceeded, caller, true)
                .await;
            return Ok(None);
        }

        let skew = now.abs_diff(timestamp);
        if skew > self.timestamp_tolerance.unsigned_abs() {
            warn!(
                request_time = timestamp,
                server_time = now,
                difference = skew,
                "Claimed timestamp outside tolerance"
            );
            self.refuse(RequestKind::TokenRequest, FailureReason::InvalidTimestamp, caller, true)
                .await;
            return Ok(None);
        }

        let token = self
            .issuer
            .issue(fingerprint, device_id, client_ip, user_agent, now)?;

        info!(
            fingerprint = %fingerprint,
            device_id = %device_id,
            expires_at = token.expires_at,
            "Token issued"
        );
        self.report(RequestOutcome::success(
            RequestKind::TokenRequest,
            fingerprint,
            device_id,
            client_ip,
            user_agent,
            self.clock.now_utc(),
        ))
        .await;

        Ok(Some(token))
    }

    /// Check a presented token against the presented fingerprint
    ///
    /// Any parse, signature, expiry or subject failure counts as a failed
    /// attempt for the fingerprint and yields `false`.
    pub async fn validate(&self, token: &str, fingerprint: &str) -> bool {
        let now = self.clock.now();

        match self.issuer.verify(token, fingerprint, now) {
            Ok(_) => {
                debug!(fingerprint = %fingerprint, "Token validated");
                true
            }
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Token validation failed");
                let caller = Caller {
                    fingerprint,
                    device_id: "",
                    ip: "",
                    user_agent: "",
                };
                self.refuse(
                    RequestKind::TokenValidation,
                    FailureReason::InvalidToken,
                    caller,
                    !fingerprint.is_empty(),
                )
                .await;
                false
            }
        }
    }

    /// Restore a fingerprint's trust and forget its failed attempts
    ///
    /// Returns `false` if the fingerprint has never been stored.
    pub async fn reset_trust(&self, fingerprint: &str) -> Result<bool> {
        self.tracker.clear_failures(fingerprint);
        Ok(self.verifier.reset_trust(fingerprint).await?)
    }

    async fn refuse(&self, kind: RequestKind, reason: FailureReason, caller: Caller<'_>, count_failure: bool) {
        warn!(
            fingerprint = %caller.fingerprint,
            device_id = %caller.device_id,
            ip = %caller.ip,
            user_agent = %caller.user_agent,
            reason = %reason,
            "Request refused"
        );

        self.report(RequestOutcome::failure(
            kind,
            reason,
            caller.fingerprint,
            caller.device_id,
            caller.ip,
            caller.user_agent,
            self.clock.now_utc(),
        ))
        .await;

        if count_failure {
            self.tracker.record_failure(caller.fingerprint, self.clock.now());
        }
    }

    async fn report(&self, outcome: RequestOutcome) {
        if let Err(e) = self.sink.record(outcome).await {
            warn!(error = %e, "Failed to record request outcome");
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Builder for [`Gatekeeper`]
///
/// Unset collaborators default to an in-memory store (also used as the
/// outcome sink), no bot signal provider, the system clock, and the
/// deployed window limits.
pub struct GatekeeperBuilder {
    issuer: TokenIssuer,
    store: Option<Arc<dyn FingerprintStore>>,
    sink: Option<Arc<dyn OutcomeSink>>,
    provider: Arc<dyn BotSignalProvider>,
    clock: Arc<dyn Clock>,
    policy: TrustPolicy,
    rate_limit: WindowLimit,
    failure_limit: WindowLimit,
    timestamp_tolerance: i64,
}

impl GatekeeperBuilder {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self {
            issuer,
            store: None,
            sink: None,
            provider: Arc::new(DisabledProvider::new()),
            clock: Arc::new(SystemClock),
            policy: TrustPolicy::default(),
            rate_limit: WindowLimit::new(3600, 100),
            failure_limit: WindowLimit::new(3600, 5),
            timestamp_tolerance: 30,
        }
    }

    pub fn store(mut self, store: Arc<dyn FingerprintStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use one in-memory store as both fingerprint store and outcome sink
    pub fn memory_store(self, store: Arc<MemoryStore>) -> Self {
        self.store(store.clone()).sink(store)
    }

    pub fn provider(mut self, provider: Arc<dyn BotSignalProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(mut self, policy: TrustPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn rate_limit(mut self, limit: WindowLimit) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn failure_limit(mut self, limit: WindowLimit) -> Self {
        self.failure_limit = limit;
        self
    }

    pub fn timestamp_tolerance(mut self, secs: i64) -> Self {
        self.timestamp_tolerance = secs;
        self
    }

    pub fn build(self) -> Gatekeeper {
        let (store, sink): (Arc<dyn FingerprintStore>, Arc<dyn OutcomeSink>) = match (self.store, self.sink) {
            (Some(store), Some(sink)) => (store, sink),
            (store, sink) => {
                let memory = Arc::new(MemoryStore::new());
                (
                    store.unwrap_or_else(|| memory.clone() as Arc<dyn FingerprintStore>),
                    sink.unwrap_or_else(|| memory as Arc<dyn OutcomeSink>),
                )
            }
        };

        Gatekeeper {
            verifier: Verifier::new(store, self.provider, self.policy, self.clock.clone()),
            tracker: AttemptTracker::new(self.rate_limit, self.failure_limit),
            issuer: self.issuer,
            sink,
            clock: self.clock,
            timestamp_tolerance: self.timestamp_tolerance,
        }
    }
}

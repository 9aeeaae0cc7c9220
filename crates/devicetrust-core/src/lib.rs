//! # DeviceTrust Core
//!
//! Domain types and pure scoring logic for fingerprint-gated token issuance.
//!
//! ## Key Concepts
//!
//! - **Attribute bundle**: the raw set of browser/device components a client submits
//! - **Fingerprint record**: one persisted record per unique fingerprint
//! - **Trust score**: integer in `[0, 100]`, decays on anomaly and recovers on clean visits
//! - **Anchors**: canvas and audio digests, treated as near-immutable per device
//!
//! ## Evaluation
//!
//! 1. **Consistency**: a known fingerprint is compared to its stored history
//!    (bot flag, anchors, hardware drift, score threshold)
//! 2. **Bot signature**: a never-seen fingerprint is screened for crawler,
//!    automation and implausible-hardware traits
//!
//! Nothing in this crate performs I/O; persistence and lookups belong to the
//! gate service.

pub mod attributes;
pub mod consistency;
pub mod error;
pub mod outcome;
pub mod policy;
pub mod record;
pub mod signature;

pub use attributes::{AttributeBundle, BotSignal};
pub use consistency::{evaluate_consistency, hardware_drift, ConsistencyOutcome, ConsistencyVerdict};
pub use error::{CoreError, Result};
pub use outcome::{FailureReason, RequestKind, RequestOutcome};
pub use policy::TrustPolicy;
pub use record::{EnvironmentKey, FingerprintRecord, TrustScore};
pub use signature::{detect_bot_signature, BotSignature};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

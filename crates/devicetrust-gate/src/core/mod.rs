//! Admission pipeline for the gate

mod admission;
mod error;
mod suspicion;
mod verification;

pub use admission::{Gatekeeper, GatekeeperBuilder, TokenRequest};
pub use error::{GateError, Result};
pub use suspicion::{SuspicionDetector, SuspicionReason};
pub use verification::{RejectionReason, VerificationOutcome, Verifier};

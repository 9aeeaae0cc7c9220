//! Device Trust Gate
//!
//! Issues short-lived access tokens to clients whose browser/device
//! fingerprint is trusted, and validates those tokens on later requests.
//!
//! A token request passes four gates, stopping at the first failure:
//! lockout after repeated failures, fingerprint verification against stored
//! history, a per-fingerprint rate limit, and timestamp freshness. Issued
//! tokens are HS256 JWTs bound to the fingerprint.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /api/time` - Server clock, used by clients to build a fresh request
//! - `POST /api/app-token` - Exchange a fingerprint for a token
//! - `GET /api/session` - Protected by `X-Fingerprint` / `X-App-Token`

pub mod api;
pub mod clock;
pub mod config;
pub mod core;
pub mod storage;
pub mod token;
pub mod tracker;

pub use api::create_router;
pub use api::handlers::AppState;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GateConfig};
pub use crate::core::{GateError, Gatekeeper, GatekeeperBuilder, TokenRequest};
pub use storage::{FingerprintStore, MemoryStore, OutcomeSink, StorageError};
pub use token::{IssuedToken, TokenIssuer};
pub use tracker::{AttemptTracker, WindowLimit};

//! Bot Signal Providers
//!
//! Third-party estimates of whether a visitor is automated. The gate asks a
//! provider once per verification; a provider that is not configured, times
//! out, or answers with garbage is equivalent to "no signal" and never fails
//! the request.
//!
//! ## Providers
//!
//! - **FingerprintJS Pro**: queries the server API's Bot Detection product,
//!   with a bounded timeout and a short per-visitor cache
//! - **Disabled**: used when no API key is configured
//! - **Static**: preloaded answers, for testing
//!
//! ## Usage
//!
//! ```ignore
//! use devicetrust_signal::{BotSignalProvider, handlers::*};
//!
//! let provider = FingerprintJsProvider::new(
//!     FingerprintJsConfig::new(api_key).with_region("eu"),
//! )?;
//!
//! if let Ok(Some(signal)) = provider.lookup("visitor-id").await {
//!     println!("bot probability: {}", signal.probability);
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod provider;

pub use error::{Result, SignalError};
pub use provider::{announce, BotSignalProvider, DisabledProvider};

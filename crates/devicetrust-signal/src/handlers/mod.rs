//! Bot signal provider implementations

pub mod fingerprintjs;
pub mod fixed;

pub use fingerprintjs::{parse_visitor_response, FingerprintJsConfig, FingerprintJsProvider};
pub use fixed::StaticSignalProvider;

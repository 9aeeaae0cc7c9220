//! API request handlers

pub mod session;
pub mod token;

pub use session::{require_token, session, AuthenticatedFingerprint, SessionResponse};
pub use token::{issue_token, server_time, ServerTimeResponse};

use crate::core::Gatekeeper;

/// Application state shared across handlers
pub struct AppState {
    /// Admission controller and token validator
    pub gatekeeper: Gatekeeper,
    /// Origins allowed by CORS; `*` allows any
    pub cors_allowed_origins: Vec<String>,
}

impl AppState {
    pub fn new(gatekeeper: Gatekeeper) -> Self {
        Self {
            gatekeeper,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_allowed_origins = origins;
        self
    }
}

//! Bot signal provider abstraction

use async_trait::async_trait;
use devicetrust_core::BotSignal;
use tracing::{debug, info};

use crate::error::Result;

/// Source of third-party bot estimates for a visitor
///
/// `Ok(None)` means the provider has nothing to say (not configured, or no
/// data for this visitor). Errors are transport or protocol failures; the
/// verification pipeline treats both identically.
#[async_trait]
pub trait BotSignalProvider: Send + Sync {
    /// Look up the bot estimate for a visitor/fingerprint identifier
    async fn lookup(&self, visitor_id: &str) -> Result<Option<BotSignal>>;

    /// Get a description of this provider (for logging)
    fn description(&self) -> &str {
        "bot signal provider"
    }
}

/// Provider used when no third-party service is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProvider;

impl DisabledProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BotSignalProvider for DisabledProvider {
    async fn lookup(&self, visitor_id: &str) -> Result<Option<BotSignal>> {
        debug!(visitor_id = %visitor_id, "Bot signal provider disabled, skipping lookup");
        Ok(None)
    }

    fn description(&self) -> &str {
        "disabled bot signal provider"
    }
}

/// Log which provider is active
pub fn announce(provider: &dyn BotSignalProvider) {
    info!(provider = provider.description(), "Bot signal provider ready");
}

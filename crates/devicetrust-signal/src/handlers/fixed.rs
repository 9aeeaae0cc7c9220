//! Static bot signal provider
//!
//! For testing purposes - answers from a preloaded table.

use async_trait::async_trait;
use devicetrust_core::BotSignal;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, SignalError};
use crate::provider::BotSignalProvider;

/// Provider that returns preconfigured signals per visitor
///
/// Visitors without an entry get `Ok(None)`. In failing mode every lookup
/// returns a timeout, which lets callers exercise the degraded path.
#[derive(Default)]
pub struct StaticSignalProvider {
    signals: RwLock<HashMap<String, BotSignal>>,
    failing: bool,
}

impl StaticSignalProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose every lookup fails
    pub fn failing() -> Self {
        Self {
            signals: RwLock::new(HashMap::new()),
            failing: true,
        }
    }

    /// Builder-style registration
    pub fn with_signal(self, visitor_id: impl Into<String>, signal: BotSignal) -> Self {
        self.set_signal(visitor_id, signal);
        self
    }

    /// Register or replace the signal for a visitor
    pub fn set_signal(&self, visitor_id: impl Into<String>, signal: BotSignal) {
        if let Ok(mut signals) = self.signals.write() {
            signals.insert(visitor_id.into(), signal);
        }
    }
}

#[async_trait]
impl BotSignalProvider for StaticSignalProvider {
    async fn lookup(&self, visitor_id: &str) -> Result<Option<BotSignal>> {
        if self.failing {
            return Err(SignalError::Timeout);
        }

        let signals = self
            .signals
            .read()
            .map_err(|e| SignalError::HttpError(e.to_string()))?;
        Ok(signals.get(visitor_id).cloned())
    }

    fn description(&self) -> &str {
        "static bot signal provider"
    }
}

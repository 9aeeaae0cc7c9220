//! FingerprintJS Pro visitor API provider
//!
//! Looks up the Bot Detection product result for a visitor and turns it into
//! a [`BotSignal`]. Results are cached per visitor for a short TTL so a burst
//! of requests from one device costs a single outbound call.

use async_trait::async_trait;
use devicetrust_core::BotSignal;
use moka::future::Cache;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Result, SignalError};
use crate::provider::BotSignalProvider;

/// Header carrying the secret API key
const API_KEY_HEADER: &str = "Auth-API-Key";

/// Configuration for the FingerprintJS Pro server API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintJsConfig {
    /// Secret server API key; empty disables lookups
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the server API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Data region the visitor data lives in
    #[serde(default = "default_region")]
    pub region: String,

    /// Upper bound on a single lookup
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// How long a looked-up signal is reused
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: Duration,

    /// Probability above which the visitor is considered a bot
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_api_url() -> String {
    "https://api.fpjs.io".to_string()
}

fn default_region() -> String {
    "us".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_millis(3000)
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_confidence_threshold() -> f64 {
    0.8
}

impl FingerprintJsConfig {
    /// Create a configuration with the given API key and default endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: default_api_url(),
            region: default_region(),
            timeout: default_timeout(),
            cache_ttl: default_cache_ttl(),
            confidence_threshold: default_confidence_threshold(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Whether an API key has been supplied
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Subset of the visitor API response we read
#[derive(Debug, Default, Deserialize)]
struct VisitorResponse {
    #[serde(default)]
    products: Products,
}

#[derive(Debug, Default, Deserialize)]
struct Products {
    #[serde(default)]
    botd: BotdProduct,
}

#[derive(Debug, Default, Deserialize)]
struct BotdProduct {
    #[serde(default)]
    data: BotdData,
}

#[derive(Debug, Default, Deserialize)]
struct BotdData {
    #[serde(default)]
    bot: BotResult,
}

#[derive(Debug, Default, Deserialize)]
struct BotResult {
    #[serde(default)]
    probability: f64,
    #[serde(default, rename = "type")]
    kind: String,
}

/// Interpret a visitor API response body
///
/// A response without a Bot Detection section yields a zero-probability signal.
pub fn parse_visitor_response(body: &str, confidence_threshold: f64) -> Result<BotSignal> {
    let response: VisitorResponse = serde_json::from_str(body)?;
    let bot = response.products.botd.data.bot;
    Ok(BotSignal::new(bot.probability, bot.kind, confidence_threshold))
}

/// Bot signal provider backed by the FingerprintJS Pro server API
pub struct FingerprintJsProvider {
    config: FingerprintJsConfig,
    /// visitor id -> last signal
    cache: Cache<String, BotSignal>,
    http_client: reqwest::Client,
}

impl FingerprintJsProvider {
    /// Create a provider; the HTTP client is built with the configured timeout
    pub fn new(config: FingerprintJsConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            cache: Cache::builder()
                .time_to_live(config.cache_ttl)
                .max_capacity(10_000)
                .build(),
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &FingerprintJsConfig {
        &self.config
    }

    /// Build `{api_url}/visitors/{visitor_id}?region={region}`
    fn visitor_url(&self, visitor_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| SignalError::InvalidResponse(format!("bad API URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| SignalError::InvalidResponse("API URL cannot be a base".into()))?
            .pop_if_empty()
            .push("visitors")
            .push(visitor_id);
        url.query_pairs_mut().append_pair("region", &self.config.region);

        Ok(url)
    }

    async fn fetch(&self, visitor_id: &str) -> Result<BotSignal> {
        let url = self.visitor_url(visitor_id)?;
        debug!(visitor_id = %visitor_id, "Calling bot signal API");

        let response = self
            .http_client
            .get(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_visitor_response(&body, self.config.confidence_threshold)
    }
}

#[async_trait]
impl BotSignalProvider for FingerprintJsProvider {
    async fn lookup(&self, visitor_id: &str) -> Result<Option<BotSignal>> {
        if !self.config.is_configured() {
            debug!("Bot signal API key not configured, skipping lookup");
            return Ok(None);
        }
        if visitor_id.is_empty() {
            return Err(SignalError::InvalidVisitor("empty visitor id".into()));
        }

        if let Some(cached) = self.cache.get(visitor_id).await {
            debug!(visitor_id = %visitor_id, "Using cached bot signal");
            return Ok(Some(cached));
        }

        let signal = self.fetch(visitor_id).await?;
        info!(
            visitor_id = %visitor_id,
            probability = signal.probability,
            bot_type = %signal.classification,
            "Bot signal received"
        );

        self.cache.insert(visitor_id.to_string(), signal.clone()).await;
        Ok(Some(signal))
    }

    fn description(&self) -> &str {
        "FingerprintJS Pro bot signal provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = FingerprintJsConfig::new("secret");

        assert_eq!(config.api_url, "https://api.fpjs.io");
        assert_eq!(config.region, "us");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.is_configured());
        assert!(!FingerprintJsConfig::new("").is_configured());
    }

    #[test]
    fn test_parse_bot_section() {
        let body = r#"{
            "visitorId": "abc",
            "products": {
                "botd": { "data": { "bot": { "probability": 0.93, "type": "headless" } } }
            }
        }"#;

        let signal = parse_visitor_response(body, 0.8).unwrap();
        assert_eq!(signal.probability, 0.93);
        assert_eq!(signal.classification, "headless");
        assert!(signal.is_bot);
    }

    #[test]
    fn test_parse_missing_bot_section_is_no_risk() {
        let signal = parse_visitor_response(r#"{"visitorId": "abc"}"#, 0.8).unwrap();
        assert_eq!(signal.probability, 0.0);
        assert!(!signal.is_bot);
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        let result = parse_visitor_response("<html>", 0.8);
        assert!(matches!(result, Err(SignalError::InvalidResponse(_))));
    }

    #[test]
    fn test_visitor_url_escapes_identifier() {
        let provider = FingerprintJsProvider::new(
            FingerprintJsConfig::new("secret")
                .with_api_url("https://eu.api.fpjs.io/")
                .with_region("eu"),
        )
        .unwrap();

        let url = provider.visitor_url("a/b c").unwrap();
        assert_eq!(url.as_str(), "https://eu.api.fpjs.io/visitors/a%2Fb%20c?region=eu");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_skips_lookup() {
        let provider = FingerprintJsProvider::new(FingerprintJsConfig::new("")).unwrap();
        assert!(provider.lookup("visitor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_visitor_rejected() {
        let provider = FingerprintJsProvider::new(FingerprintJsConfig::new("secret")).unwrap();
        assert!(matches!(
            provider.lookup("").await,
            Err(SignalError::InvalidVisitor(_))
        ));
    }
}

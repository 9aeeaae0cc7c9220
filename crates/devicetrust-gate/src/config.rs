//! Gate configuration
//!
//! Loaded from environment variables. `GATE_SIGNING_SECRET` is required;
//! everything else has a default. A variable that is set but cannot be
//! parsed is an error rather than a silent fallback.

use devicetrust_core::TrustPolicy;
use devicetrust_signal::handlers::FingerprintJsConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::tracker::WindowLimit;

/// Minimum signing secret length in bytes (HS256 key size)
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be at least {min} bytes, got {len}")]
    WeakSecret {
        name: &'static str,
        len: usize,
        min: usize,
    },

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Complete gate configuration
#[derive(Clone)]
pub struct GateConfig {
    pub port: u16,
    pub log_level: String,
    /// HS256 shared secret
    pub signing_secret: String,
    /// Token lifetime in seconds
    pub token_expiration: i64,
    /// Allowed distance between claimed and server time, in seconds
    pub timestamp_tolerance: i64,
    pub rate_limit: WindowLimit,
    pub failure_limit: WindowLimit,
    /// Allowed CORS origins; `*` allows any
    pub cors_allowed_origins: Vec<String>,
    pub database_url: Option<String>,
    pub fingerprint_api: FingerprintJsConfig,
    pub policy: TrustPolicy,
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("signing_secret", &"<redacted>")
            .field("token_expiration", &self.token_expiration)
            .field("timestamp_tolerance", &self.timestamp_tolerance)
            .field("rate_limit", &self.rate_limit)
            .field("failure_limit", &self.failure_limit)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("fingerprint_api_configured", &self.fingerprint_api.is_configured())
            .field("policy", &self.policy)
            .finish()
    }
}

impl GateConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };

        let signing_secret = vars
            .string("GATE_SIGNING_SECRET")
            .ok_or(ConfigError::Missing("GATE_SIGNING_SECRET"))?;
        if signing_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                name: "GATE_SIGNING_SECRET",
                len: signing_secret.len(),
                min: MIN_SECRET_LEN,
            });
        }

        let token_expiration = vars.positive("GATE_TOKEN_EXPIRATION", 300)?;
        let timestamp_tolerance = vars.non_negative("GATE_TOKEN_TIMESTAMP_TOLERANCE", 30)?;
        let rate_limit = WindowLimit::new(
            vars.positive("GATE_RATE_LIMIT_WINDOW", 3600)?,
            vars.nonzero("GATE_RATE_LIMIT_MAX", 100)?,
        );
        let failure_limit = WindowLimit::new(
            vars.positive("GATE_FAILED_ATTEMPT_WINDOW", 3600)?,
            vars.nonzero("GATE_MAX_FAILED_ATTEMPTS", 5)?,
        );

        let cors_allowed_origins = vars
            .string("GATE_CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let policy = load_policy(&vars)?;

        let mut fingerprint_api = FingerprintJsConfig::new(vars.string("FINGERPRINT_API_KEY").unwrap_or_default())
            .with_timeout(Duration::from_millis(vars.parse("FINGERPRINT_API_TIMEOUT_MS", 3000u64)?))
            .with_cache_ttl(Duration::from_secs(vars.parse("FINGERPRINT_API_CACHE_TTL", 60u64)?))
            .with_confidence_threshold(policy.bot_confidence_threshold);
        if let Some(url) = vars.string("FINGERPRINT_API_URL") {
            fingerprint_api = fingerprint_api.with_api_url(url);
        }
        if let Some(region) = vars.string("FINGERPRINT_API_REGION") {
            fingerprint_api = fingerprint_api.with_region(region);
        }

        Ok(Self {
            port: vars.parse("GATE_PORT", 8080)?,
            log_level: vars.string("GATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            signing_secret,
            token_expiration,
            timestamp_tolerance,
            rate_limit,
            failure_limit,
            cors_allowed_origins,
            database_url: vars.string("GATE_DATABASE_URL"),
            fingerprint_api,
            policy,
        })
    }
}

fn load_policy(vars: &Vars<'_>) -> Result<TrustPolicy, ConfigError> {
    let defaults = TrustPolicy::default();

    Ok(TrustPolicy {
        initial_score: vars.score("GATE_POLICY_INITIAL_SCORE", defaults.initial_score)?,
        admit_threshold: vars.score("GATE_POLICY_ADMIT_THRESHOLD", defaults.admit_threshold)?,
        bot_penalty: vars.parse("GATE_POLICY_BOT_PENALTY", defaults.bot_penalty)?,
        anchor_mismatch_penalty: vars.parse(
            "GATE_POLICY_ANCHOR_MISMATCH_PENALTY",
            defaults.anchor_mismatch_penalty,
        )?,
        hardware_drift_penalty: vars.parse(
            "GATE_POLICY_HARDWARE_DRIFT_PENALTY",
            defaults.hardware_drift_penalty,
        )?,
        clean_visit_reward: vars.parse("GATE_POLICY_CLEAN_VISIT_REWARD", defaults.clean_visit_reward)?,
        max_hardware_drift: vars.parse("GATE_POLICY_MAX_HARDWARE_DRIFT", defaults.max_hardware_drift)?,
        suspicious_bot_probability: vars.probability(
            "GATE_POLICY_SUSPICIOUS_BOT_PROBABILITY",
            defaults.suspicious_bot_probability,
        )?,
        bot_confidence_threshold: vars.probability(
            "GATE_POLICY_BOT_CONFIDENCE_THRESHOLD",
            defaults.bot_confidence_threshold,
        )?,
    })
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// Set and non-blank value
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.string(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn positive(&self, name: &'static str, default: i64) -> Result<i64, ConfigError> {
        let value = self.parse(name, default)?;
        if value <= 0 {
            return Err(invalid(name, value, "must be positive"));
        }
        Ok(value)
    }

    fn non_negative(&self, name: &'static str, default: i64) -> Result<i64, ConfigError> {
        let value = self.parse(name, default)?;
        if value < 0 {
            return Err(invalid(name, value, "must not be negative"));
        }
        Ok(value)
    }

    /// Window caps; zero would refuse every request
    fn nonzero(&self, name: &'static str, default: u32) -> Result<u32, ConfigError> {
        let value = self.parse(name, default)?;
        if value == 0 {
            return Err(invalid(name, value, "must be at least 1"));
        }
        Ok(value)
    }

    fn score(&self, name: &'static str, default: u8) -> Result<u8, ConfigError> {
        let value = self.parse(name, default)?;
        if value > 100 {
            return Err(invalid(name, value, "must be within 0..=100"));
        }
        Ok(value)
    }

    fn probability(&self, name: &'static str, default: f64) -> Result<f64, ConfigError> {
        let value: f64 = self.parse(name, default)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid(name, value, "must be within 0.0..=1.0"));
        }
        Ok(value)
    }
}

fn invalid(name: &'static str, value: impl fmt::Display, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<GateConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GateConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("GATE_SIGNING_SECRET", SECRET)]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.token_expiration, 300);
        assert_eq!(config.timestamp_tolerance, 30);
        assert_eq!(config.rate_limit, WindowLimit::new(3600, 100));
        assert_eq!(config.failure_limit, WindowLimit::new(3600, 5));
        assert_eq!(config.cors_allowed_origins, vec!["*"]);
        assert_eq!(config.database_url, None);
        assert!(!config.fingerprint_api.is_configured());
        assert_eq!(config.fingerprint_api.timeout, Duration::from_secs(3));
        assert_eq!(config.policy, TrustPolicy::default());
    }

    #[test]
    fn test_secret_is_required_and_strong() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("GATE_SIGNING_SECRET"));
        assert!(matches!(
            load(&[("GATE_SIGNING_SECRET", "short")]),
            Err(ConfigError::WeakSecret { len: 5, .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GATE_SIGNING_SECRET", SECRET),
            ("GATE_PORT", "9000"),
            ("GATE_TOKEN_EXPIRATION", "60"),
            ("GATE_RATE_LIMIT_MAX", "10"),
            ("GATE_CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("FINGERPRINT_API_KEY", "fpjs-key"),
            ("FINGERPRINT_API_REGION", "eu"),
            ("GATE_POLICY_ADMIT_THRESHOLD", "70"),
            ("GATE_POLICY_BOT_CONFIDENCE_THRESHOLD", "0.9"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.token_expiration, 60);
        assert_eq!(config.rate_limit.max, 10);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(config.fingerprint_api.is_configured());
        assert_eq!(config.fingerprint_api.region, "eu");
        assert_eq!(config.fingerprint_api.confidence_threshold, 0.9);
        assert_eq!(config.policy.admit_threshold, 70);
    }

    #[test]
    fn test_unparsable_value_is_an_error() {
        let err = load(&[("GATE_SIGNING_SECRET", SECRET), ("GATE_RATE_LIMIT_MAX", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "GATE_RATE_LIMIT_MAX", .. }));

        let err = load(&[
            ("GATE_SIGNING_SECRET", SECRET),
            ("GATE_POLICY_SUSPICIOUS_BOT_PROBABILITY", "1.5"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = load(&[("GATE_SIGNING_SECRET", SECRET), ("GATE_TOKEN_EXPIRATION", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_limits_that_refuse_everything_are_rejected() {
        for (name, value) in [
            ("GATE_MAX_FAILED_ATTEMPTS", "0"),
            ("GATE_RATE_LIMIT_MAX", "0"),
            ("GATE_TOKEN_TIMESTAMP_TOLERANCE", "-5"),
        ] {
            let err = load(&[("GATE_SIGNING_SECRET", SECRET), (name, value)]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { name: n, .. } if *n == name),
                "{name}={value} gave {err:?}"
            );
        }

        let config = load(&[("GATE_SIGNING_SECRET", SECRET), ("GATE_TOKEN_TIMESTAMP_TOLERANCE", "0")]).unwrap();
        assert_eq!(config.timestamp_tolerance, 0);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = load(&[("GATE_SIGNING_SECRET", SECRET)]).unwrap();
        assert!(!format!("{:?}", config).contains(SECRET));
    }
}

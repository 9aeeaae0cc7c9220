//! Fingerprint records and the trust score

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::attributes::{keys, AttributeBundle};
use crate::error::{CoreError, Result};

/// Trust/consistency score, always within `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct TrustScore(u8);

impl TrustScore {
    pub const MIN: TrustScore = TrustScore(0);
    pub const MAX: TrustScore = TrustScore(100);

    /// Create a score, clamping into range
    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Deduct points, flooring at 0
    #[must_use]
    pub fn penalize(self, points: u8) -> Self {
        Self(self.0.saturating_sub(points))
    }

    /// Add points, capping at 100
    #[must_use]
    pub fn reward(self, points: u8) -> Self {
        Self(self.0.saturating_add(points).min(100))
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for TrustScore {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        if (0..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(format!("trust score {} outside [0, 100]", value))
        }
    }
}

impl From<TrustScore> for i64 {
    fn from(score: TrustScore) -> Self {
        score.0 as i64
    }
}

/// Environment tuple used to detect template reuse across fingerprints
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentKey {
    pub user_agent: String,
    pub platform: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub language: String,
}

/// Persisted state for one unique fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Client-supplied fingerprint identifier (unique key)
    pub fingerprint: String,

    /// Full attribute bundle as submitted, for audit
    pub components: String,

    pub user_agent: String,
    pub platform: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub language: String,
    pub webgl_supported: bool,
    pub webgl_renderer: String,
    pub webgl_vendor: String,
    pub cpu_cores: String,
    pub device_memory: String,
    pub hardware_concurrency: String,
    pub touch_support: bool,
    pub color_depth: String,
    pub pixel_ratio: String,
    pub fonts: String,
    pub audio: String,
    pub canvas: String,

    /// Bot probability, 0.0 when no signal was ever seen
    pub bot_probability: f64,
    /// Provider classification label
    pub bot_type: String,
    /// Whether the fingerprint has been flagged as a bot
    pub is_bot: bool,

    /// Seconds since epoch
    pub first_seen_at: i64,
    /// Seconds since epoch, never decreases
    pub last_seen_at: i64,

    pub consistency_score: TrustScore,
}

impl FingerprintRecord {
    /// Normalize an attribute bundle into a record
    ///
    /// Missing or unrecognized components default to empty/false/zero.
    /// The score starts at the maximum and both timestamps are `now`.
    pub fn from_bundle(fingerprint: &str, bundle: &AttributeBundle, now: i64) -> Result<Self> {
        if fingerprint.is_empty() {
            return Err(CoreError::MissingField("fingerprint".into()));
        }

        Ok(Self {
            fingerprint: fingerprint.to_string(),
            components: bundle.to_audit_blob()?,
            user_agent: bundle.get_str(keys::USER_AGENT),
            platform: bundle.get_str(keys::PLATFORM),
            screen_resolution: bundle.get_str(keys::SCREEN_RESOLUTION),
            timezone: bundle.get_str(keys::TIMEZONE),
            language: bundle.get_str(keys::LANGUAGE),
            webgl_supported: bundle.get_bool(keys::WEBGL_SUPPORTED),
            webgl_renderer: bundle.get_str(keys::WEBGL_RENDERER),
            webgl_vendor: bundle.get_str(keys::WEBGL_VENDOR),
            cpu_cores: bundle.get_str(keys::CPU_CORES),
            device_memory: bundle.get_str(keys::DEVICE_MEMORY),
            hardware_concurrency: bundle.get_str(keys::HARDWARE_CONCURRENCY),
            touch_support: bundle.get_bool(keys::TOUCH_SUPPORT),
            color_depth: bundle.get_str(keys::COLOR_DEPTH),
            pixel_ratio: bundle.get_str(keys::PIXEL_RATIO),
            fonts: bundle.get_str(keys::FONTS),
            audio: bundle.get_str(keys::AUDIO),
            canvas: bundle.get_str(keys::CANVAS),
            bot_probability: bundle.get_f64(keys::BOT_PROBABILITY).unwrap_or(0.0),
            bot_type: bundle.get_str(keys::BOT_TYPE),
            is_bot: bundle.get_bool(keys::IS_BOT),
            first_seen_at: now,
            last_seen_at: now,
            consistency_score: TrustScore::MAX,
        })
    }

    /// Refresh last-seen, keeping it monotonic
    pub fn touch(&mut self, now: i64) {
        self.last_seen_at = self.last_seen_at.max(now);
    }

    /// Whether the record carries any bot signal
    pub fn has_bot_signal(&self) -> bool {
        self.bot_probability > 0.0 || !self.bot_type.is_empty() || self.is_bot
    }

    /// Overwrite bot fields with whatever signal `incoming` carries
    ///
    /// A bot flag, once raised, is only cleared by an explicit reset.
    pub fn absorb_bot_signal(&mut self, incoming: &FingerprintRecord) {
        if incoming.bot_probability > 0.0 {
            self.bot_probability = incoming.bot_probability;
        }
        if !incoming.bot_type.is_empty() {
            self.bot_type = incoming.bot_type.clone();
        }
        if incoming.is_bot {
            self.is_bot = true;
        }
    }

    pub fn environment(&self) -> EnvironmentKey {
        EnvironmentKey {
            user_agent: self.user_agent.clone(),
            platform: self.platform.clone(),
            screen_resolution: self.screen_resolution.clone(),
            timezone: self.timezone.clone(),
            language: self.language.clone(),
        }
    }

    /// Whether this record shares the given environment tuple
    pub fn matches_environment(&self, env: &EnvironmentKey) -> bool {
        self.user_agent == env.user_agent
            && self.platform == env.platform
            && self.screen_resolution == env.screen_resolution
            && self.timezone == env.timezone
            && self.language == env.language
    }
}

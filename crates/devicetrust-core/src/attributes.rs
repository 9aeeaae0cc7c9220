//! Attribute bundles submitted by browser clients
//!
//! The bundle is an open JSON object. A fixed set of named components is
//! extracted into a [`FingerprintRecord`](crate::FingerprintRecord); the rest
//! is retained verbatim in the audit blob.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Component names recognized in an attribute bundle
pub mod keys {
    pub const USER_AGENT: &str = "userAgent";
    pub const PLATFORM: &str = "platform";
    pub const SCREEN_RESOLUTION: &str = "screenResolution";
    pub const TIMEZONE: &str = "timezone";
    pub const LANGUAGE: &str = "language";
    pub const WEBGL_SUPPORTED: &str = "webglSupported";
    pub const WEBGL_RENDERER: &str = "webglRenderer";
    pub const WEBGL_VENDOR: &str = "webglVendor";
    pub const CPU_CORES: &str = "cpuCores";
    pub const DEVICE_MEMORY: &str = "deviceMemory";
    pub const HARDWARE_CONCURRENCY: &str = "hardwareConcurrency";
    pub const TOUCH_SUPPORT: &str = "touchSupport";
    pub const COLOR_DEPTH: &str = "colorDepth";
    pub const PIXEL_RATIO: &str = "pixelRatio";
    pub const FONTS: &str = "fonts";
    pub const AUDIO: &str = "audio";
    pub const CANVAS: &str = "canvas";
    pub const BOT_PROBABILITY: &str = "botProbability";
    pub const BOT_TYPE: &str = "botType";
    pub const IS_BOT: &str = "isBot";
}

/// Bot estimate returned by an external signal provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSignal {
    /// Probability in `[0, 1]` that the visitor is automated
    pub probability: f64,

    /// Provider classification label (may be empty)
    #[serde(default)]
    pub classification: String,

    /// Whether the provider is confident the visitor is a bot
    pub is_bot: bool,
}

impl BotSignal {
    /// Build a signal, deciding `is_bot` against a confidence threshold
    ///
    /// Probabilities outside `[0, 1]` are clamped; NaN is treated as 0.
    pub fn new(probability: f64, classification: impl Into<String>, confidence_threshold: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };

        Self {
            probability,
            classification: classification.into(),
            is_bot: probability > confidence_threshold,
        }
    }
}

/// Raw attribute bundle as submitted by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBundle(Map<String, Value>);

impl AttributeBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or overwrite a component
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw access to a component
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Read a component as text
    ///
    /// Strings are returned as-is; numbers and booleans are rendered in their
    /// JSON form so `4` and `"4"` compare equal. Anything else is empty.
    pub fn get_str(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Read a boolean component
    ///
    /// Browsers report some flags as the strings `"true"`/`"false"`; those are
    /// accepted alongside JSON booleans. Anything else is `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Read a numeric component; strings are not parsed
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    /// Merge provider data into the bundle, overwriting client-supplied bot fields
    pub fn merge_signal(&mut self, signal: &BotSignal) {
        self.insert(keys::BOT_PROBABILITY, signal.probability);
        self.insert(keys::BOT_TYPE, signal.classification.clone());
        self.insert(keys::IS_BOT, signal.is_bot);
    }

    /// Serialize the full bundle for audit storage
    pub fn to_audit_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

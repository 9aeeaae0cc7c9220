//! Bot-signature heuristic
//!
//! Pure screening of a record's attributes for traits that real browsers on
//! real hardware do not exhibit. Used for fingerprints with no history.

use crate::record::FingerprintRecord;

/// Crawler and search-engine tokens, matched case-insensitively in the user agent
const CRAWLER_TOKENS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "slurp",
    "googlebot",
    "bingbot",
    "baiduspider",
    "yandexbot",
];

/// Headless browser and automation driver tokens
const AUTOMATION_TOKENS: &[&str] = &["headlesschrome", "phantomjs", "selenium"];

/// Software rasterizers reported as the WebGL renderer
const SOFTWARE_RENDERERS: &[&str] = &["SwiftShader"];

/// WebGL vendor strings reported by automation setups
const AUTOMATION_VENDORS: &[&str] = &["Google Inc."];

/// Which trait marked the record as automated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotSignature {
    EmptyUserAgent,
    CrawlerUserAgent(&'static str),
    AutomationUserAgent(&'static str),
    SoftwareRenderer(&'static str),
    AutomationVendor(&'static str),
    /// Implausible hardware hint, named by attribute
    ImplausibleHardware(&'static str),
    /// Canvas or audio digest missing
    MissingAnchor(&'static str),
}

/// Return the first bot signature found in the record, if any
pub fn detect_bot_signature(record: &FingerprintRecord) -> Option<BotSignature> {
    let user_agent = record.user_agent.to_lowercase();

    if user_agent.is_empty() {
        return Some(BotSignature::EmptyUserAgent);
    }
    if let Some(token) = CRAWLER_TOKENS.iter().find(|t| user_agent.contains(*t)) {
        return Some(BotSignature::CrawlerUserAgent(*token));
    }
    if let Some(token) = AUTOMATION_TOKENS.iter().find(|t| user_agent.contains(*t)) {
        return Some(BotSignature::AutomationUserAgent(*token));
    }

    if let Some(sig) = SOFTWARE_RENDERERS
        .iter()
        .find(|s| record.webgl_renderer.contains(*s))
    {
        return Some(BotSignature::SoftwareRenderer(*sig));
    }
    if let Some(sig) = AUTOMATION_VENDORS
        .iter()
        .find(|s| record.webgl_vendor.contains(*s))
    {
        return Some(BotSignature::AutomationVendor(*sig));
    }

    if record.cpu_cores == "1" {
        return Some(BotSignature::ImplausibleHardware("cpu_cores"));
    }
    if record.device_memory == "undefined" {
        return Some(BotSignature::ImplausibleHardware("device_memory"));
    }
    if record.hardware_concurrency == "0" {
        return Some(BotSignature::ImplausibleHardware("hardware_concurrency"));
    }

    if record.canvas.is_empty() {
        return Some(BotSignature::MissingAnchor("canvas"));
    }
    if record.audio.is_empty() {
        return Some(BotSignature::MissingAnchor("audio"));
    }

    None
}

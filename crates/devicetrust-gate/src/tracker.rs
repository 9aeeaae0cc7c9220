//! Attempt and rate tracking
//!
//! Two per-fingerprint sliding windows, each a "count + last timestamp" map.
//! Entries whose last timestamp precedes the window start are evicted lazily
//! on access, before the count for the current fingerprint is read.
//!
//! Both windows sit behind one mutex so prune-then-check is atomic. The
//! state is process-local and is lost on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Width and limit of one sliding window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    /// Window width in seconds
    pub window_secs: i64,
    /// Maximum count tolerated inside the window
    pub max: u32,
}

impl WindowLimit {
    pub fn new(window_secs: i64, max: u32) -> Self {
        Self { window_secs, max }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    last: i64,
}

#[derive(Debug, Default)]
struct SlidingWindow {
    entries: HashMap<String, Entry>,
}

impl SlidingWindow {
    fn prune(&mut self, now: i64, width: i64) {
        let window_start = now - width;
        self.entries.retain(|_, e| e.last >= window_start);
    }

    fn count(&self, key: &str) -> u32 {
        self.entries.get(key).map(|e| e.count).unwrap_or(0)
    }

    fn increment(&mut self, key: &str, now: i64) -> u32 {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert(Entry { count: 0, last: now });
        entry.count = entry.count.saturating_add(1);
        entry.last = now;
        entry.count
    }
}

#[derive(Debug, Default)]
struct Windows {
    requests: SlidingWindow,
    failures: SlidingWindow,
}

/// Process-wide request-rate and failed-attempt counters
#[derive(Debug)]
pub struct AttemptTracker {
    rate: WindowLimit,
    failures: WindowLimit,
    windows: Mutex<Windows>,
}

impl AttemptTracker {
    pub fn new(rate: WindowLimit, failures: WindowLimit) -> Self {
        Self {
            rate,
            failures,
            windows: Mutex::new(Windows::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        // Counters hold no invariant a panicking holder could break.
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a request; `false` once the count exceeds the rate limit
    pub fn check_and_increment_rate(&self, fingerprint: &str, now: i64) -> bool {
        let mut windows = self.lock();
        windows.requests.prune(now, self.rate.window_secs);
        let count = windows.requests.increment(fingerprint, now);
        count <= self.rate.max
    }

    /// Whether failures inside the window have reached the maximum; never increments
    pub fn is_locked_out(&self, fingerprint: &str, now: i64) -> bool {
        let mut windows = self.lock();
        windows.failures.prune(now, self.failures.window_secs);
        windows.failures.count(fingerprint) >= self.failures.max
    }

    /// Record a failed attempt, returning the count inside the window
    pub fn record_failure(&self, fingerprint: &str, now: i64) -> u32 {
        let mut windows = self.lock();
        windows.failures.prune(now, self.failures.window_secs);
        let attempts = windows.failures.increment(fingerprint, now);
        if attempts >= self.failures.max {
            warn!(fingerprint = %fingerprint, attempts = attempts, "Too many failed attempts");
        }
        attempts
    }

    /// Forget every failure recorded for a fingerprint
    pub fn clear_failures(&self, fingerprint: &str) {
        self.lock().failures.entries.remove(fingerprint);
    }

    /// Failures currently counted for a fingerprint
    pub fn failure_count(&self, fingerprint: &str, now: i64) -> u32 {
        let mut windows = self.lock();
        windows.failures.prune(now, self.failures.window_secs);
        windows.failures.count(fingerprint)
    }
}

//! Sliding-window rate limiter
//!
//! Tracks per-identifier request timestamps and allows a request only while
//! the count inside the trailing window stays below the caller's maximum.
//! A rejected request is not recorded, so being throttled does not extend
//! the throttle.

use crate::clock::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Upper bound on tracked identifiers before idle windows are dropped
const MAX_TRACKED_IDENTIFIERS: usize = 10_000;

/// Snapshot of one identifier's window
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Requests currently inside the window
    pub current: u32,
    /// Maximum allowed requests per window
    pub limit: u32,
    /// Requests still available, floored at 0
    pub remaining: u32,
    /// Instant the oldest recorded request leaves the window
    pub reset_at: Option<DateTime<Utc>>,
}

/// Sliding-window request limiter keyed by an opaque client identifier
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter with the given window length.
    pub fn new(window_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window: Duration::seconds(window_seconds as i64),
            clock,
        }
    }

    fn evict_expired(&self, timestamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while timestamps.front().is_some_and(|t| *t <= cutoff) {
            timestamps.pop_front();
        }
    }

    /// Check and record one request for `identifier`.
    ///
    /// Returns `false` without recording when the window already holds
    /// `max` requests. The whole check-then-record step runs under one
    /// lock, so a single logical caller never interleaves with itself.
    pub fn is_allowed(&self, identifier: &str, max: u32) -> bool {
        let now = self.clock.now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Keep the table bounded when many one-off identifiers show up
        if windows.len() > MAX_TRACKED_IDENTIFIERS {
            let cutoff = now - self.window;
            windows.retain(|_, ts| ts.back().is_some_and(|t| *t > cutoff));
        }

        let timestamps = windows.entry(identifier.to_string()).or_default();
        self.evict_expired(timestamps, now);

        if timestamps.len() >= max as usize {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Requests still available in the current window, floored at 0.
    /// Non-mutating.
    pub fn remaining_requests(&self, identifier: &str, max: u32) -> u32 {
        self.info(identifier, max).remaining
    }

    /// Instant at which the oldest recorded request leaves the window.
    /// `None` if the identifier has no live history.
    pub fn reset_time(&self, identifier: &str) -> Option<DateTime<Utc>> {
        self.info(identifier, 0).reset_at
    }

    /// Non-mutating snapshot of an identifier's window state.
    pub fn info(&self, identifier: &str, max: u32) -> RateLimitInfo {
        let now = self.clock.now();
        let cutoff = now - self.window;
        let windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let live: Vec<DateTime<Utc>> = windows
            .get(identifier)
            .map(|ts| ts.iter().copied().filter(|t| *t > cutoff).collect())
            .unwrap_or_default();

        let current = live.len() as u32;
        RateLimitInfo {
            current,
            limit: max,
            remaining: max.saturating_sub(current),
            reset_at: live.first().map(|oldest| *oldest + self.window),
        }
    }
}

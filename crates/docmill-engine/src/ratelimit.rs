//! Per-API-key admission control with fixed minute and day windows.
//!
//! Fixed-window counters (not a sliding log): each key holds two
//! independent (count, window-start) pairs. On every admission check the
//! windows whose boundary has passed are reset, then both counters are
//! checked and incremented atomically under one mutex. The trade is a
//! bounded burst at window boundaries for O(1) memory and O(1) checks per
//! key.
//!
//! The critical section covers only the counter check-and-increment — two
//! concurrent requests for the same key can never both observe "one slot
//! remaining". A rejected request increments nothing.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use docmill_core::defaults::{DAY_WINDOW_SECS, MINUTE_WINDOW_SECS};
use docmill_core::ApiKeyRecord;

/// One fixed window: count of admissions since the window started.
#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    started: i64,
    count: u32,
}

impl FixedWindow {
    fn new(started: i64) -> Self {
        Self { started, count: 0 }
    }

    /// Reset the counter when `now` has crossed the window boundary,
    /// advancing the start to the current boundary.
    fn roll(&mut self, now: i64, length: i64) {
        let boundary = now - now.rem_euclid(length);
        if boundary > self.started {
            self.started = boundary;
            self.count = 0;
        }
    }

    fn resets_at(&self, length: i64) -> i64 {
        self.started + length
    }
}

/// Per-key window pair.
#[derive(Debug, Clone, Copy)]
struct KeyWindows {
    minute: FixedWindow,
    day: FixedWindow,
}

impl KeyWindows {
    fn new(now: i64) -> Self {
        Self {
            minute: FixedWindow::new(now - now.rem_euclid(MINUTE_WINDOW_SECS)),
            day: FixedWindow::new(now - now.rem_euclid(DAY_WINDOW_SECS)),
        }
    }
}

/// Remaining quota after (or without) an admission, surfaced as telemetry
/// on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub remaining_minute: u32,
    pub remaining_day: u32,
    /// Unix timestamp when the minute window resets.
    pub minute_reset: i64,
    /// Unix timestamp when the day window resets.
    pub day_reset: i64,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed(QuotaSnapshot),
    Rejected {
        /// Seconds until the minute window resets — the tighter, more
        /// frequently-hit limit.
        retry_after_secs: u64,
        snapshot: QuotaSnapshot,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed(_))
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        match self {
            Admission::Allowed(s) => *s,
            Admission::Rejected { snapshot, .. } => *snapshot,
        }
    }
}

/// Keyed fixed-window rate limiter.
///
/// Entries are created on first request for a key and never evicted within
/// process lifetime unless [`RateLimiter::revoke`] is called by the
/// key-management collaborator.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, KeyWindows>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Atomic check-and-increment for one request.
    ///
    /// `now` is injected rather than read from the clock so the admission
    /// contract is a pure function of its inputs.
    pub fn admit(&self, key: &ApiKeyRecord, now: DateTime<Utc>) -> Admission {
        let ts = now.timestamp();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let entry = windows
            .entry(key.id.clone())
            .or_insert_with(|| KeyWindows::new(ts));

        entry.minute.roll(ts, MINUTE_WINDOW_SECS);
        entry.day.roll(ts, DAY_WINDOW_SECS);

        if entry.minute.count >= key.rpm || entry.day.count >= key.rpd {
            let retry_after_secs = (entry.minute.resets_at(MINUTE_WINDOW_SECS) - ts).max(1) as u64;
            return Admission::Rejected {
                retry_after_secs,
                snapshot: snapshot_of(entry, key),
            };
        }

        entry.minute.count += 1;
        entry.day.count += 1;
        Admission::Allowed(snapshot_of(entry, key))
    }

    /// Read the current quota without consuming a slot.
    pub fn peek(&self, key: &ApiKeyRecord, now: DateTime<Utc>) -> QuotaSnapshot {
        let ts = now.timestamp();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let entry = windows
            .entry(key.id.clone())
            .or_insert_with(|| KeyWindows::new(ts));
        entry.minute.roll(ts, MINUTE_WINDOW_SECS);
        entry.day.roll(ts, DAY_WINDOW_SECS);
        snapshot_of(entry, key)
    }

    /// Drop a key's counters after the key-management collaborator signals
    /// revocation.
    pub fn revoke(&self, key_id: &str) {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        windows.remove(key_id);
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().expect("rate limiter mutex poisoned").len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of(entry: &KeyWindows, key: &ApiKeyRecord) -> QuotaSnapshot {
    QuotaSnapshot {
        remaining_minute: key.rpm.saturating_sub(entry.minute.count),
        remaining_day: key.rpd.saturating_sub(entry.day.count),
        minute_reset: entry.minute.resets_at(MINUTE_WINDOW_SECS),
        day_reset: entry.day.resets_at(DAY_WINDOW_SECS),
    }
}

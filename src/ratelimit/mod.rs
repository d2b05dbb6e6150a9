//! Fixed-window rate limiting for credential endpoints.
//!
//! Entries are keyed by an identity string such as `login:<client-ip>` and
//! count attempts within a window measured from the first attempt. Staleness
//! is evaluated lazily against the stored window start at check time; a
//! periodic sweep reclaims memory from elapsed entries. No per-key timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> RateLimitDecision;
}

/// Test/bring-up limiter that allows everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Fixed-window counter store. The whole table sits behind one mutex so the
/// increment-and-compare in `check` is atomic per key: two concurrent checks
/// at count 4 can never both slip under a threshold of 5.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    entries: Mutex<HashMap<String, WindowEntry>>,
    max_attempts: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
            window,
        }
    }

    /// Count one attempt against `key` as of `now`.
    ///
    /// An absent or elapsed entry resets to count 1 (fixed window, not
    /// sliding: further attempts do not renew the window).
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let entry = entries
            .entry(key.to_string())
            .or_insert(WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count <= self.max_attempts {
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }

    /// Drop entries whose window elapsed before `now`.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.window_start) < self.window);
        before - entries.len()
    }

    /// Background task reclaiming memory from stale windows.
    pub fn spawn_sweeper(limiter: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                sleep(SWEEP_INTERVAL).await;
                let removed = limiter.sweep_at(Instant::now());
                if removed > 0 {
                    debug!(removed, "rate limit sweep reclaimed stale entries");
                }
            }
        })
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

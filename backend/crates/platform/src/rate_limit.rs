//! Rate Limiting Infrastructure
//!
//! Sliding-window rate limiting with an optional explicit block.
//!
//! The algorithm lives here as a pure state machine over caller-supplied
//! timestamps; storage backends own one [`SlidingWindowState`] per
//! `(identifier, action)` key and are responsible for per-key atomicity.

use std::collections::VecDeque;
use std::time::Duration;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
    /// Once the limit is exceeded, reject everything until this much time
    /// has passed. `None` means denial is a pure function of the window.
    pub block_duration: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
            block_duration: None,
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            block_duration: None,
        }
    }

    pub fn with_block(max_requests: u32, window_secs: u64, block_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            block_duration: Some(Duration::from_secs(block_secs)),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }

    pub fn block_ms(&self) -> Option<i64> {
        self.block_duration.map(|d| d.as_millis() as i64)
    }
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Requests left in the window after this one (0 when denied)
    pub remaining: u32,
    /// Seconds until the block or window clears (only set when denied)
    pub retry_after_secs: Option<u64>,
}

impl RateLimitResult {
    fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: None,
        }
    }

    fn denied(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs: Some(retry_after_secs),
        }
    }
}

/// Per-key sliding window state
///
/// Event timestamps within the trailing window, plus the explicit block
/// expiry once the limit has been exceeded. The block check is O(1) and
/// short-circuits before any window bookkeeping, so a client already being
/// penalized costs almost nothing per attempt. Timestamps are expected to
/// be non-decreasing across calls for a given key.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowState {
    events: VecDeque<i64>,
    blocked_until_ms: Option<i64>,
}

impl SlidingWindowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt at `now_ms` and decide whether it may proceed.
    ///
    /// Denied attempts on the window path are recorded too, so a client
    /// that keeps hammering stays denied until its traffic actually stops.
    /// Attempts during an active block are not recorded; the fast path
    /// never touches the window.
    pub fn check(&mut self, now_ms: i64, config: &RateLimitConfig) -> RateLimitResult {
        if let Some(blocked_until) = self.blocked_until_ms {
            if blocked_until > now_ms {
                return RateLimitResult::denied(secs_until(blocked_until - now_ms));
            }
            self.blocked_until_ms = None;
        }

        let window_start = now_ms - config.window_ms();
        while let Some(&oldest) = self.events.front() {
            if oldest > window_start {
                break;
            }
            self.events.pop_front();
        }

        self.events.push_back(now_ms);
        let count = self.events.len() as u32;

        if count <= config.max_requests {
            return RateLimitResult::allowed(config.max_requests - count);
        }

        if let Some(block_ms) = config.block_ms() {
            self.blocked_until_ms = Some(now_ms + block_ms);
            return RateLimitResult::denied(secs_until(block_ms));
        }

        // No block configured: the caller may retry once the oldest
        // in-window event has aged out.
        let oldest = self.events.front().copied().unwrap_or(now_ms);
        RateLimitResult::denied(secs_until(oldest + config.window_ms() - now_ms))
    }

    /// True once neither window events nor a block keep this key alive
    ///
    /// Lets map-based backends drop dead entries.
    pub fn is_idle(&self, now_ms: i64, config: &RateLimitConfig) -> bool {
        let window_start = now_ms - config.window_ms();
        let has_live_event = self.events.back().is_some_and(|&last| last > window_start);
        let has_live_block = self.blocked_until_ms.is_some_and(|until| until > now_ms);
        !has_live_event && !has_live_block
    }
}

/// Round milliseconds up to whole seconds, never reporting zero
///
/// Shared by storage backends when they compute `retry_after_secs`
/// themselves (e.g. from a block expiry held in the database).
pub fn secs_until(delta_ms: i64) -> u64 {
    ((delta_ms.max(0) + 999) / 1000).max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_remaining_decreases_monotonically() {
        let config = RateLimitConfig::new(5, 60);
        let mut state = SlidingWindowState::new();

        let mut last_remaining = config.max_requests;
        for i in 0..5 {
            let result = state.check(T0 + i * 1000, &config);
            assert!(result.allowed);
            assert!(result.remaining <= last_remaining);
            last_remaining = result.remaining;
        }
        assert_eq!(last_remaining, 0);
    }

    #[test]
    fn test_denies_exactly_at_limit_plus_one() {
        let config = RateLimitConfig::new(10, 60);
        let mut state = SlidingWindowState::new();

        for i in 0..10 {
            assert!(state.check(T0 + i, &config).allowed, "call {} should pass", i);
        }

        let eleventh = state.check(T0 + 10, &config);
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.remaining, 0);
        assert!(eleventh.retry_after_secs.is_some());
    }

    #[test]
    fn test_window_slides_continuously() {
        let config = RateLimitConfig::new(2, 60);
        let mut state = SlidingWindowState::new();

        assert!(state.check(T0, &config).allowed);
        assert!(state.check(T0 + 30_000, &config).allowed);
        assert!(!state.check(T0 + 40_000, &config).allowed);

        // 61s after the first event: that event has aged out, but the
        // 30s and 40s events are still inside the trailing window.
        assert!(!state.check(T0 + 61_000, &config).allowed);

        // Once everything has aged out the key is fresh again.
        assert!(state.check(T0 + 200_000, &config).allowed);
    }

    #[test]
    fn test_denied_attempts_keep_window_occupied() {
        let config = RateLimitConfig::new(1, 60);
        let mut state = SlidingWindowState::new();

        assert!(state.check(T0, &config).allowed);
        // A denied attempt counts as window pressure: retrying 61s after
        // the first (allowed) event is still denied because the denied
        // attempt at T0+59s is inside the window.
        assert!(!state.check(T0 + 59_000, &config).allowed);
        assert!(!state.check(T0 + 61_000, &config).allowed);
    }

    #[test]
    fn test_retry_after_without_block_tracks_window() {
        let config = RateLimitConfig::new(1, 60);
        let mut state = SlidingWindowState::new();

        assert!(state.check(T0, &config).allowed);
        let denied = state.check(T0 + 10_000, &config);
        assert!(!denied.allowed);
        // Oldest event leaves the window 50s from now.
        assert_eq!(denied.retry_after_secs, Some(50));
    }

    #[test]
    fn test_block_engages_on_excess() {
        let config = RateLimitConfig::with_block(2, 60, 900);
        let mut state = SlidingWindowState::new();

        assert!(state.check(T0, &config).allowed);
        assert!(state.check(T0 + 1000, &config).allowed);

        let tripped = state.check(T0 + 2000, &config);
        assert!(!tripped.allowed);
        assert_eq!(tripped.retry_after_secs, Some(900));

        // While blocked: denied with a shrinking hint, no window work.
        let during = state.check(T0 + 2000 + 400_000, &config);
        assert!(!during.allowed);
        assert_eq!(during.retry_after_secs, Some(500));
    }

    #[test]
    fn test_block_expires() {
        let config = RateLimitConfig::with_block(1, 60, 120);
        let mut state = SlidingWindowState::new();

        assert!(state.check(T0, &config).allowed);
        assert!(!state.check(T0 + 1000, &config).allowed);

        // After the block and the window have both passed, clean slate.
        let after = state.check(T0 + 1000 + 121_000, &config);
        assert!(after.allowed);
    }

    #[test]
    fn test_blocked_attempts_do_not_extend_block() {
        let config = RateLimitConfig::with_block(1, 10, 60);
        let mut state = SlidingWindowState::new();

        assert!(state.check(T0, &config).allowed);
        let tripped = state.check(T0 + 1000, &config);
        assert_eq!(tripped.retry_after_secs, Some(60));

        // Hammering during the block leaves the expiry where it was.
        for i in 0..5 {
            state.check(T0 + 2000 + i * 1000, &config);
        }
        let late = state.check(T0 + 60_000, &config);
        assert!(!late.allowed);
        assert_eq!(late.retry_after_secs, Some(1));
    }

    #[test]
    fn test_retry_after_rounds_up_and_never_zero() {
        assert_eq!(secs_until(1), 1);
        assert_eq!(secs_until(999), 1);
        assert_eq!(secs_until(1000), 1);
        assert_eq!(secs_until(1001), 2);
        assert_eq!(secs_until(0), 1);
        assert_eq!(secs_until(-5), 1);
    }

    #[test]
    fn test_is_idle() {
        let config = RateLimitConfig::new(2, 60);
        let mut state = SlidingWindowState::new();
        assert!(state.is_idle(T0, &config));

        state.check(T0, &config);
        assert!(!state.is_idle(T0 + 1000, &config));
        assert!(state.is_idle(T0 + 61_000, &config));
    }

    #[test]
    fn test_is_idle_respects_block() {
        let config = RateLimitConfig::with_block(1, 10, 300);
        let mut state = SlidingWindowState::new();

        state.check(T0, &config);
        state.check(T0 + 1000, &config);

        // Window events age out long before the block does.
        assert!(!state.is_idle(T0 + 60_000, &config));
        assert!(state.is_idle(T0 + 302_000, &config));
    }
}

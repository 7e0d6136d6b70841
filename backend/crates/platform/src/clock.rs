//! Time Source Abstraction
//!
//! All time-dependent domain logic receives "now" from the caller, so
//! lockout expiry and session freshness need no background jobs and are
//! deterministic under test. This module is the only place the system
//! clock is read.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Time source
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Current instant as Unix milliseconds
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall-clock time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually controlled time source
///
/// Shared handle: clones observe the same instant, so a test can hold one
/// handle while the code under test holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start at the given instant
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

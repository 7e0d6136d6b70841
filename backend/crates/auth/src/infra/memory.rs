//! In-Memory Rate Limiter
//!
//! Single-process backend over the platform sliding-window state machine.
//! One mutex guards the whole key map, so each check is atomic per key by
//! construction. State lives for the process lifetime only; use the
//! PostgreSQL backend when limits must survive restarts or span replicas.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use platform::clock::Clock;
use platform::rate_limit::{RateLimitConfig, RateLimitResult, SlidingWindowState};

use crate::domain::repository::RateLimiter;
use crate::error::{AuthError, AuthResult};

type Key = (String, String);

/// In-memory sliding-window rate limiter
#[derive(Clone)]
pub struct MemoryRateLimiter<C: Clock> {
    clock: C,
    buckets: Arc<Mutex<HashMap<Key, SlidingWindowState>>>,
}

impl<C: Clock> MemoryRateLimiter<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drop keys with no live window events and no active block
    ///
    /// `config` must be the one those keys are checked under; callers
    /// with heterogeneous configs purge per action group.
    pub fn purge_idle(&self, config: &RateLimitConfig) -> AuthResult<usize> {
        let now_ms = self.clock.now_ms();
        let mut buckets = self.lock_buckets()?;
        let before = buckets.len();
        buckets.retain(|_, state| !state.is_idle(now_ms, config));
        Ok(before - buckets.len())
    }

    fn lock_buckets(&self) -> AuthResult<std::sync::MutexGuard<'_, HashMap<Key, SlidingWindowState>>> {
        self.buckets
            .lock()
            .map_err(|_| AuthError::Internal("rate limiter mutex poisoned".to_string()))
    }
}

impl<C: Clock> RateLimiter for MemoryRateLimiter<C> {
    async fn check_limit(
        &self,
        identifier: &str,
        action: &str,
        config: &RateLimitConfig,
    ) -> AuthResult<RateLimitResult> {
        let now_ms = self.clock.now_ms();
        let mut buckets = self.lock_buckets()?;
        let state = buckets
            .entry((identifier.to_string(), action.to_string()))
            .or_default();

        Ok(state.check(now_ms, config))
    }

    async fn reset(&self, identifier: &str, action: &str) -> AuthResult<()> {
        let mut buckets = self.lock_buckets()?;
        buckets.remove(&(identifier.to_string(), action.to_string()));
        Ok(())
    }
}

//! Repository Traits
//!
//! Interfaces for data persistence and rate limiting. Implementations
//! live in the infrastructure layer. Single-key updates (the lockout
//! counters, rate-limit counters) rely on the backing store's per-key
//! atomicity; no application-level locks are taken.

use platform::rate_limit::{RateLimitConfig, RateLimitResult};

use crate::domain::entity::{session::Session, user::User};
use crate::domain::value_object::{email::Email, session_id::SessionId, user_id::UserId};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Find user by normalized email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Persist a user (insert or update)
    ///
    /// Uniqueness of the normalized email is enforced here, at the
    /// persistence boundary.
    async fn save(&self, user: &User) -> AuthResult<()>;

    /// Check if a normalized email is already registered
    async fn email_exists(&self, email: &Email) -> AuthResult<bool>;
}

/// Session repository trait
///
/// `find_by_id` only returns sessions that are still valid under the
/// implementation's expiry policy; expired rows behave as absent.
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Find a live session by ID
    async fn find_by_id(&self, session_id: &SessionId) -> AuthResult<Option<Session>>;

    /// Persist a session
    async fn save(&self, session: &Session) -> AuthResult<()>;

    /// Delete a session (deleting a missing session is not an error)
    async fn delete(&self, session_id: &SessionId) -> AuthResult<()>;

    /// Delete all sessions for a user (e.g. on password change)
    async fn delete_all_for_user(&self, user_id: &UserId) -> AuthResult<u64>;

    /// Bump a session's last-activity timestamp
    async fn update_activity(
        &self,
        session_id: &SessionId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AuthResult<()>;

    /// Remove sessions that have exceeded the expiry policy
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}

/// Rate limiter trait
///
/// Decides whether an `(identifier, action)` pair may proceed under the
/// given sliding-window config. Implementations own their time source.
#[trait_variant::make(RateLimiter: Send)]
pub trait LocalRateLimiter {
    /// Record an attempt and check it against the limit
    async fn check_limit(
        &self,
        identifier: &str,
        action: &str,
        config: &RateLimitConfig,
    ) -> AuthResult<RateLimitResult>;

    /// Clear all state for a key (tests and administrative override)
    async fn reset(&self, identifier: &str, action: &str) -> AuthResult<()>;
}

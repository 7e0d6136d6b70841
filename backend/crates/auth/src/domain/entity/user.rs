//! User Entity
//!
//! Aggregate root owning credential metadata and the account lockout
//! state machine. All transitions take a caller-supplied `now`; the
//! entity never reads the system clock, so lockout expiry needs no
//! background job and is fully deterministic under test.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{email::Email, user_id::UserId, user_password::UserPassword};

/// User entity
///
/// States: Active (`locked_until` absent or in the past) and Locked
/// (`locked_until` in the future relative to the supplied `now`).
/// `failed_login_attempts` only ever resets on a successful login.
#[derive(Debug, Clone)]
pub struct User {
    /// Internal UUID identifier
    pub id: UserId,
    /// Email as entered (original casing) plus normalized form
    pub email: Email,
    /// Hashed password (Argon2id PHC string)
    pub password_hash: UserPassword,
    /// Consecutive login failure count
    pub failed_login_attempts: u32,
    /// Account locked until (temporary lockout after failures)
    pub locked_until: Option<DateTime<Utc>>,
    /// Last successful login time
    pub last_login_at: Option<DateTime<Utc>>,
    /// Client IP of the last successful login
    pub last_login_ip: Option<IpAddr>,
    /// User-Agent of the last successful login
    pub last_login_user_agent: Option<String>,
    /// When the password was last set
    pub password_changed_at: DateTime<Utc>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Maximum login failures before temporary lockout
    pub const MAX_LOGIN_FAILURES: u32 = 5;
    /// Lockout duration in minutes
    pub const LOCKOUT_MINUTES: i64 = 15;

    /// Create a new user
    pub fn new(email: Email, password_hash: UserPassword, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email,
            password_hash,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            last_login_ip: None,
            last_login_user_agent: None,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if account is locked at the given instant
    ///
    /// Pure query; callers run this before any counter mutation.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        if let Some(locked_until) = self.locked_until {
            now < locked_until
        } else {
            false
        }
    }

    /// Record a failed login attempt
    ///
    /// Reaching [`Self::MAX_LOGIN_FAILURES`] engages the lock. Attempts
    /// made while a lock is already in force are a no-op: the lock window
    /// is never extended by traffic arriving during it.
    pub fn record_failed_login(&mut self, now: DateTime<Utc>) {
        if self.is_locked(now) {
            return;
        }

        self.failed_login_attempts += 1;
        self.updated_at = now;

        if self.failed_login_attempts >= Self::MAX_LOGIN_FAILURES {
            self.locked_until = Some(now + Duration::minutes(Self::LOCKOUT_MINUTES));
        }
    }

    /// Record a successful login
    ///
    /// Resets the failure counter, clears any expired lock, and captures
    /// the client audit fields.
    pub fn record_successful_login(
        &mut self,
        now: DateTime<Utc>,
        ip: Option<IpAddr>,
        user_agent: Option<String>,
    ) {
        self.failed_login_attempts = 0;
        self.locked_until = None;
        self.last_login_at = Some(now);
        self.last_login_ip = ip;
        self.last_login_user_agent = user_agent;
        self.updated_at = now;
    }
}

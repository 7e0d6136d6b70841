//! Session Entity
//!
//! Represents an authenticated user session. A session belongs to exactly
//! one user; its id is never reused. Expiry is an infrastructure policy:
//! a session is valid only while it exists in the repository and its last
//! activity falls within the configured idle TTL, so the entity itself
//! carries no expiry timestamp.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{session_id::SessionId, user_id::UserId};

/// Auth session entity
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID (UUIDv4, unguessable bearer identifier)
    pub id: SessionId,
    /// Owning user (back-reference only)
    pub user_id: UserId,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp (sliding freshness window)
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Update last activity timestamp
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }
}

//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use platform::clock::{Clock, SystemClock};
use platform::rate_limit::{RateLimitConfig, RateLimitResult, secs_until};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{session::Session, user::User};
use crate::domain::repository::{RateLimiter, SessionRepository, UserRepository};
use crate::domain::value_object::{
    email::Email, session_id::SessionId, user_id::UserId, user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

/// Retention for rate-limit events past any realistic window
const EVENT_RETENTION_MS: i64 = 3600_000; // 1 hour

// ============================================================================
// Auth Repository (users + sessions)
// ============================================================================

/// PostgreSQL-backed auth repository
///
/// Session expiry policy lives here: a session is live while its last
/// activity is within the configured idle TTL. Expired rows behave as
/// absent on lookup and are pruned by [`Self::cleanup_expired`].
#[derive(Clone)]
pub struct PgAuthRepository<C: Clock = SystemClock> {
    pool: PgPool,
    session_ttl_ms: i64,
    clock: C,
}

impl PgAuthRepository<SystemClock> {
    pub fn new(pool: PgPool, session_ttl: std::time::Duration) -> Self {
        Self::with_clock(pool, session_ttl, SystemClock)
    }
}

impl<C: Clock> PgAuthRepository<C> {
    pub fn with_clock(pool: PgPool, session_ttl: std::time::Duration, clock: C) -> Self {
        Self {
            pool,
            session_ttl_ms: session_ttl.as_millis() as i64,
            clock,
        }
    }

    /// Earliest last-activity instant a live session may have
    fn session_cutoff(&self) -> DateTime<Utc> {
        self.clock.now() - chrono::Duration::milliseconds(self.session_ttl_ms)
    }
}

impl<C: Clock> UserRepository for PgAuthRepository<C> {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                email_normalized,
                password_hash,
                failed_login_attempts,
                locked_until,
                last_login_at,
                last_login_ip::TEXT,
                last_login_user_agent,
                password_changed_at,
                created_at,
                updated_at
            FROM users
            WHERE email_normalized = $1
            "#,
        )
        .bind(email.normalized())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                email_normalized,
                password_hash,
                failed_login_attempts,
                locked_until,
                last_login_at,
                last_login_ip::TEXT,
                last_login_user_agent,
                password_changed_at,
                created_at,
                updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn save(&self, user: &User) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                email_normalized,
                password_hash,
                failed_login_attempts,
                locked_until,
                last_login_at,
                last_login_ip,
                last_login_user_agent,
                password_changed_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8::inet, $9, $10, $11, $12)
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                email_normalized = EXCLUDED.email_normalized,
                password_hash = EXCLUDED.password_hash,
                failed_login_attempts = EXCLUDED.failed_login_attempts,
                locked_until = EXCLUDED.locked_until,
                last_login_at = EXCLUDED.last_login_at,
                last_login_ip = EXCLUDED.last_login_ip,
                last_login_user_agent = EXCLUDED.last_login_user_agent,
                password_changed_at = EXCLUDED.password_changed_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.email.normalized())
        .bind(user.password_hash.as_phc_string())
        .bind(user.failed_login_attempts as i32)
        .bind(user.locked_until)
        .bind(user.last_login_at)
        .bind(user.last_login_ip.map(|ip| ip.to_string()))
        .bind(user.last_login_user_agent.as_deref())
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // A concurrent registration can slip past the email_exists
            // pre-check; the unique index on email_normalized is the
            // authoritative arbiter.
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23505")
                    && db_err.constraint() == Some("users_email_normalized_key") =>
            {
                Err(AuthError::EmailTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email_normalized = $1)",
        )
        .bind(email.normalized())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

impl<C: Clock> SessionRepository for PgAuthRepository<C> {
    async fn find_by_id(&self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                session_id,
                user_id,
                created_at,
                last_activity_at
            FROM auth_sessions
            WHERE session_id = $1 AND last_activity_at > $2
            "#,
        )
        .bind(session_id.as_uuid())
        .bind(self.session_cutoff())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_session()))
    }

    async fn save(&self, session: &Session) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                session_id,
                user_id,
                created_at,
                last_activity_at
            ) VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> AuthResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE session_id = $1")
            .bind(session_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(user_id = %user_id, deleted, "Deleted all sessions for user");
        Ok(deleted)
    }

    async fn update_activity(&self, session_id: &SessionId, now: DateTime<Utc>) -> AuthResult<()> {
        sqlx::query("UPDATE auth_sessions SET last_activity_at = $2 WHERE session_id = $1")
            .bind(session_id.as_uuid())
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE last_activity_at <= $1")
            .bind(self.session_cutoff())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(sessions_deleted = deleted, "Cleaned up expired auth sessions");
        Ok(deleted)
    }
}

// ============================================================================
// Rate Limiter
// ============================================================================

/// PostgreSQL-backed sliding-window rate limiter
///
/// State is two tables: an append-only event log for the window and a
/// block table for the O(1) denial fast path. Insert-then-count means a
/// concurrent burst on one key may transiently overcount — never
/// undercount — which is the safe direction for a limiter and satisfies
/// the per-key atomicity this design requires.
#[derive(Clone)]
pub struct PgRateLimiter<C: Clock = SystemClock> {
    pool: PgPool,
    clock: C,
}

impl PgRateLimiter<SystemClock> {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, SystemClock)
    }
}

impl<C: Clock> PgRateLimiter<C> {
    pub fn with_clock(pool: PgPool, clock: C) -> Self {
        Self { pool, clock }
    }

    /// Drop events past retention and blocks past expiry
    pub async fn cleanup_expired(&self) -> AuthResult<(u64, u64)> {
        let now_ms = self.clock.now_ms();

        let events_deleted =
            sqlx::query("DELETE FROM auth_rate_limit_events WHERE occurred_at_ms < $1")
                .bind(now_ms - EVENT_RETENTION_MS)
                .execute(&self.pool)
                .await?
                .rows_affected();

        let blocks_deleted =
            sqlx::query("DELETE FROM auth_rate_limit_blocks WHERE blocked_until_ms <= $1")
                .bind(now_ms)
                .execute(&self.pool)
                .await?
                .rows_affected();

        tracing::info!(
            events_deleted,
            blocks_deleted,
            "Cleaned up expired rate-limit state"
        );

        Ok((events_deleted, blocks_deleted))
    }
}

impl<C: Clock> RateLimiter for PgRateLimiter<C> {
    async fn check_limit(
        &self,
        identifier: &str,
        action: &str,
        config: &RateLimitConfig,
    ) -> AuthResult<RateLimitResult> {
        let now_ms = self.clock.now_ms();

        // Fast path: an active block rejects without window bookkeeping
        let blocked_until = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT blocked_until_ms FROM auth_rate_limit_blocks
            WHERE identifier = $1 AND action = $2 AND blocked_until_ms > $3
            "#,
        )
        .bind(identifier)
        .bind(action)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(until) = blocked_until {
            return Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after_secs: Some(secs_until(until - now_ms)),
            });
        }

        // Record the attempt, then count the trailing window including it
        sqlx::query(
            "INSERT INTO auth_rate_limit_events (identifier, action, occurred_at_ms) VALUES ($1, $2, $3)",
        )
        .bind(identifier)
        .bind(action)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;

        let window_start = now_ms - config.window_ms();
        let (count, oldest) = sqlx::query_as::<_, (i64, Option<i64>)>(
            r#"
            SELECT COUNT(*), MIN(occurred_at_ms) FROM auth_rate_limit_events
            WHERE identifier = $1 AND action = $2 AND occurred_at_ms > $3
            "#,
        )
        .bind(identifier)
        .bind(action)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        let count = count as u32;
        if count <= config.max_requests {
            return Ok(RateLimitResult {
                allowed: true,
                remaining: config.max_requests - count,
                retry_after_secs: None,
            });
        }

        if let Some(block_ms) = config.block_ms() {
            // Competing writers keep the latest expiry
            sqlx::query(
                r#"
                INSERT INTO auth_rate_limit_blocks (identifier, action, blocked_until_ms)
                VALUES ($1, $2, $3)
                ON CONFLICT (identifier, action) DO UPDATE SET
                    blocked_until_ms = GREATEST(auth_rate_limit_blocks.blocked_until_ms, EXCLUDED.blocked_until_ms)
                "#,
            )
            .bind(identifier)
            .bind(action)
            .bind(now_ms + block_ms)
            .execute(&self.pool)
            .await?;

            tracing::warn!(action, count, max = config.max_requests, "Rate limit block engaged");

            return Ok(RateLimitResult {
                allowed: false,
                remaining: 0,
                retry_after_secs: Some(secs_until(block_ms)),
            });
        }

        let oldest = oldest.unwrap_or(now_ms);
        Ok(RateLimitResult {
            allowed: false,
            remaining: 0,
            retry_after_secs: Some(secs_until(oldest + config.window_ms() - now_ms)),
        })
    }

    async fn reset(&self, identifier: &str, action: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM auth_rate_limit_events WHERE identifier = $1 AND action = $2")
            .bind(identifier)
            .bind(action)
            .execute(&self.pool)
            .await?;

        sqlx::query("DELETE FROM auth_rate_limit_blocks WHERE identifier = $1 AND action = $2")
            .bind(identifier)
            .bind(action)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ============================================================================
// Row types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    email_normalized: String,
    password_hash: String,
    failed_login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    last_login_ip: Option<String>,
    last_login_user_agent: Option<String>,
    password_changed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        Ok(User {
            id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email, self.email_normalized),
            password_hash: UserPassword::from_phc_string(self.password_hash)?,
            failed_login_attempts: self.failed_login_attempts.max(0) as u32,
            locked_until: self.locked_until,
            last_login_at: self.last_login_at,
            last_login_ip: self.last_login_ip.and_then(|s| s.parse().ok()),
            last_login_user_agent: self.last_login_user_agent,
            password_changed_at: self.password_changed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

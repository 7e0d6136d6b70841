//! Use-case scenario tests
//!
//! The four use cases exercised end-to-end against in-memory repository
//! fakes with a manual clock, so lockout expiry, session freshness, and
//! rate-limit windows are all deterministic.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use platform::clock::{Clock, ManualClock};
use platform::rate_limit::RateLimitConfig;

use crate::application::config::AuthConfig;
use crate::application::token::issue_session_token;
use crate::application::{
    CurrentUserUseCase, LoginInput, LoginOutput, LoginUseCase, LogoutUseCase, RegisterInput,
    RegisterUseCase,
};
use crate::domain::entity::{session::Session, user::User};
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::{email::Email, session_id::SessionId, user_id::UserId};
use crate::error::{AuthError, AuthResult};
use crate::infra::memory::MemoryRateLimiter;

// ============================================================================
// In-memory repository fakes
// ============================================================================

#[derive(Clone)]
struct MemoryAuthStore {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    clock: ManualClock,
    session_ttl_ms: i64,
}

impl MemoryAuthStore {
    fn new(clock: ManualClock, session_ttl_ms: i64) -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            clock,
            session_ttl_ms,
        }
    }

    fn session_cutoff(&self) -> DateTime<Utc> {
        self.clock.now() - Duration::milliseconds(self.session_ttl_ms)
    }

    fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn remove_user(&self, user_id: &UserId) {
        self.users.lock().unwrap().remove(user_id.as_uuid());
    }

    fn stored_session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.lock().unwrap().get(session_id.as_uuid()).cloned()
    }
}

impl UserRepository for MemoryAuthStore {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.normalized() == email.normalized())
            .cloned())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(user_id.as_uuid()).cloned())
    }

    async fn save(&self, user: &User) -> AuthResult<()> {
        let mut users = self.users.lock().unwrap();
        let duplicate = users.values().any(|existing| {
            existing.email.normalized() == user.email.normalized() && existing.id != user.id
        });
        if duplicate {
            return Err(AuthError::EmailTaken);
        }
        users.insert(*user.id.as_uuid(), user.clone());
        Ok(())
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .any(|u| u.email.normalized() == email.normalized()))
    }
}

impl SessionRepository for MemoryAuthStore {
    async fn find_by_id(&self, session_id: &SessionId) -> AuthResult<Option<Session>> {
        let cutoff = self.session_cutoff();
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session_id.as_uuid())
            .filter(|s| s.last_activity_at > cutoff)
            .cloned())
    }

    async fn save(&self, session: &Session) -> AuthResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(*session.id.as_uuid(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> AuthResult<()> {
        self.sessions.lock().unwrap().remove(session_id.as_uuid());
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != *user_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn update_activity(&self, session_id: &SessionId, now: DateTime<Utc>) -> AuthResult<()> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id.as_uuid()) {
            session.touch(now);
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let cutoff = self.session_cutoff();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.last_activity_at > cutoff);
        Ok((before - sessions.len()) as u64)
    }
}

// ============================================================================
// Test harness
// ============================================================================

const PASSWORD: &str = "Str0ngPass!23";
const WRONG_PASSWORD: &str = "Wr0ngPass!99";
const CLIENT_IP: &str = "203.0.113.10";

struct Harness {
    store: Arc<MemoryAuthStore>,
    limiter: Arc<MemoryRateLimiter<ManualClock>>,
    clock: Arc<ManualClock>,
    config: Arc<AuthConfig>,
}

impl Harness {
    /// Harness with a generous per-account limit so lockout behavior can
    /// be observed without the email limiter tripping first
    fn new() -> Self {
        Self::with_config(AuthConfig {
            login_email_limit: RateLimitConfig::new(100, 300),
            ..base_config()
        })
    }

    fn with_config(config: AuthConfig) -> Self {
        let clock = ManualClock::starting_at(Utc::now());
        let store = MemoryAuthStore::new(clock.clone(), config.session_ttl_ms());
        Self {
            store: Arc::new(store),
            limiter: Arc::new(MemoryRateLimiter::new(clock.clone())),
            clock: Arc::new(clock),
            config: Arc::new(config),
        }
    }

    fn register_use_case(&self) -> RegisterUseCase<MemoryAuthStore, ManualClock> {
        RegisterUseCase::new(self.store.clone(), self.clock.clone(), self.config.clone())
    }

    fn login_use_case(
        &self,
    ) -> LoginUseCase<MemoryAuthStore, MemoryAuthStore, MemoryRateLimiter<ManualClock>, ManualClock>
    {
        LoginUseCase::new(
            self.store.clone(),
            self.store.clone(),
            self.limiter.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    fn logout_use_case(&self) -> LogoutUseCase<MemoryAuthStore> {
        LogoutUseCase::new(self.store.clone(), self.config.clone())
    }

    fn current_user_use_case(
        &self,
    ) -> CurrentUserUseCase<MemoryAuthStore, MemoryAuthStore, ManualClock> {
        CurrentUserUseCase::new(
            self.store.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    async fn register(&self, email: &str) -> User {
        self.register_use_case()
            .execute(RegisterInput {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                confirm_password: PASSWORD.to_string(),
            })
            .await
            .expect("registration should succeed")
            .user
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutput> {
        self.login_use_case()
            .execute(LoginInput {
                email: email.to_string(),
                password: password.to_string(),
                client_ip: Some(CLIENT_IP.parse().unwrap()),
                user_agent: Some("TestAgent/1.0".to_string()),
            })
            .await
    }

    async fn login_from_ip(
        &self,
        email: &str,
        password: &str,
        ip: Option<IpAddr>,
    ) -> AuthResult<LoginOutput> {
        self.login_use_case()
            .execute(LoginInput {
                email: email.to_string(),
                password: password.to_string(),
                client_ip: ip,
                user_agent: None,
            })
            .await
    }

    async fn stored_user(&self, email: &str) -> User {
        self.store
            .find_by_email(&Email::new(email).unwrap())
            .await
            .unwrap()
            .expect("user should exist")
    }
}

fn base_config() -> AuthConfig {
    AuthConfig {
        session_secret: [7u8; 32],
        ..AuthConfig::default()
    }
}

// ============================================================================
// Register
// ============================================================================

mod register_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_creates_active_user() {
        let h = Harness::new();
        let user = h.register("a@x.com").await;

        assert_eq!(user.email.as_str(), "a@x.com");
        assert_eq!(user.failed_login_attempts, 0);
        assert!(user.locked_until.is_none());
        assert!(user.last_login_at.is_none());

        // Registration never signs the user in
        assert_eq!(h.store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_mismatched_confirmation() {
        let h = Harness::new();
        let result = h
            .register_use_case()
            .execute(RegisterInput {
                email: "a@x.com".to_string(),
                password: PASSWORD.to_string(),
                confirm_password: "Different!23".to_string(),
            })
            .await;

        match result {
            Err(AuthError::Validation { field, .. }) => assert_eq!(field, "confirm_password"),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let h = Harness::new();
        let result = h
            .register_use_case()
            .execute(RegisterInput {
                email: "a@x.com".to_string(),
                password: "password123".to_string(),
                confirm_password: "password123".to_string(),
            })
            .await;

        match result {
            Err(AuthError::Validation { field, .. }) => assert_eq!(field, "password"),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_email() {
        let h = Harness::new();
        let result = h
            .register_use_case()
            .execute(RegisterInput {
                email: "not-an-email".to_string(),
                password: PASSWORD.to_string(),
                confirm_password: PASSWORD.to_string(),
            })
            .await;

        match result {
            Err(AuthError::Validation { field, .. }) => assert_eq!(field, "email"),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email_case_insensitively() {
        let h = Harness::new();
        h.register("a@x.com").await;

        let result = h
            .register_use_case()
            .execute(RegisterInput {
                email: "A@X.COM".to_string(),
                password: PASSWORD.to_string(),
                confirm_password: PASSWORD.to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }
}

// ============================================================================
// Login
// ============================================================================

mod login_tests {
    use super::*;
    use crate::application::token::parse_session_token;

    #[tokio::test]
    async fn test_login_success_creates_session() {
        let h = Harness::new();
        h.register("a@x.com").await;

        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        assert_eq!(output.user.failed_login_attempts, 0);
        assert_eq!(output.user.last_login_ip, Some(CLIENT_IP.parse().unwrap()));
        assert_eq!(
            output.user.last_login_user_agent.as_deref(),
            Some("TestAgent/1.0")
        );

        // Session persisted and the token resolves back to it
        let parsed = parse_session_token(&output.session_token, &h.config.session_secret).unwrap();
        assert_eq!(parsed, output.session.id);
        assert!(h.store.stored_session(&output.session.id).is_some());
    }

    #[tokio::test]
    async fn test_login_accepts_email_case_variants() {
        let h = Harness::new();
        h.register("a@x.com").await;

        assert!(h.login("A@X.com", PASSWORD).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_are_indistinguishable() {
        let h = Harness::new();
        h.register("a@x.com").await;

        let unknown = h.login("ghost@x.com", PASSWORD).await.unwrap_err();
        let wrong = h.login("a@x.com", WRONG_PASSWORD).await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        // Identical caller-visible message
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_failed_attempts_accumulate() {
        let h = Harness::new();
        h.register("a@x.com").await;

        for _ in 0..3 {
            let _ = h.login("a@x.com", WRONG_PASSWORD).await;
        }

        let user = h.stored_user("a@x.com").await;
        assert_eq!(user.failed_login_attempts, 3);
        assert!(!user.is_locked(h.clock.now()));
    }

    #[tokio::test]
    async fn test_lockout_after_threshold_rejects_correct_password() {
        let h = Harness::new();
        h.register("a@x.com").await;

        // Five consecutive failures; each one reports the generic error
        for _ in 0..User::MAX_LOGIN_FAILURES {
            let err = h.login("a@x.com", WRONG_PASSWORD).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        let user = h.stored_user("a@x.com").await;
        assert!(user.is_locked(h.clock.now()));

        // Within the lock, even the correct password is rejected with the
        // same generic error, and the lock window is not extended.
        h.clock.advance(Duration::minutes(1));
        let locked_until = user.locked_until;
        let err = h.login("a@x.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(h.stored_user("a@x.com").await.locked_until, locked_until);
        assert_eq!(h.store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_login_succeeds_after_lock_expires() {
        let h = Harness::new();
        h.register("a@x.com").await;

        for _ in 0..User::MAX_LOGIN_FAILURES {
            let _ = h.login("a@x.com", WRONG_PASSWORD).await;
        }

        h.clock
            .advance(Duration::minutes(User::LOCKOUT_MINUTES) + Duration::seconds(1));

        let output = h.login("a@x.com", PASSWORD).await.unwrap();
        assert_eq!(output.user.failed_login_attempts, 0);
        assert!(output.user.locked_until.is_none());
        assert!(h.store.stored_session(&output.session.id).is_some());
    }

    #[tokio::test]
    async fn test_ip_rate_limit_denies_eleventh_attempt() {
        let h = Harness::new();
        h.register("real@x.com").await;

        let ip: IpAddr = "198.51.100.4".parse().unwrap();

        // Ten attempts against distinct unknown accounts pass the IP limit
        for i in 0..10 {
            let email = format!("guess{}@x.com", i);
            let err = h
                .login_from_ip(&email, WRONG_PASSWORD, Some(ip))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        // The eleventh is rejected before credentials are even considered,
        // correct password included.
        let err = h
            .login_from_ip("real@x.com", PASSWORD, Some(ip))
            .await
            .unwrap_err();
        match err {
            AuthError::RateLimited { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert_eq!(h.store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_ip_rate_limit_does_not_leak_across_ips() {
        let h = Harness::new();
        h.register("a@x.com").await;

        let attacker: IpAddr = "198.51.100.4".parse().unwrap();
        for i in 0..10 {
            let _ = h
                .login_from_ip(&format!("g{}@x.com", i), WRONG_PASSWORD, Some(attacker))
                .await;
        }

        // A different client is unaffected
        let victim: IpAddr = "198.51.100.5".parse().unwrap();
        assert!(h.login_from_ip("a@x.com", PASSWORD, Some(victim)).await.is_ok());
    }

    #[tokio::test]
    async fn test_account_rate_limit_blocks_and_holds() {
        // Default config: 5 attempts / 5 min per account, then a 15 min block
        let h = Harness::with_config(base_config());
        h.register("a@x.com").await;

        for _ in 0..5 {
            let err = h.login_from_ip("a@x.com", WRONG_PASSWORD, None).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        let err = h.login_from_ip("a@x.com", PASSWORD, None).await.unwrap_err();
        match err {
            AuthError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 900),
            other => panic!("expected rate limit, got {:?}", other),
        }

        // The explicit block outlives the sliding window
        h.clock.advance(Duration::seconds(600));
        assert!(matches!(
            h.login_from_ip("a@x.com", PASSWORD, None).await,
            Err(AuthError::RateLimited { .. })
        ));

        // And clears once it has elapsed
        h.clock.advance(Duration::seconds(301));
        assert!(h.login_from_ip("a@x.com", PASSWORD, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_account_rate_limit_keyed_on_normalized_email() {
        let h = Harness::with_config(base_config());
        h.register("a@x.com").await;

        for _ in 0..5 {
            let _ = h.login_from_ip("A@X.COM", WRONG_PASSWORD, None).await;
        }

        // Case variations share the same bucket
        assert!(matches!(
            h.login_from_ip("a@x.com", PASSWORD, None).await,
            Err(AuthError::RateLimited { .. })
        ));
    }
}

// ============================================================================
// Logout
// ============================================================================

mod logout_tests {
    use super::*;

    #[tokio::test]
    async fn test_logout_deletes_session_and_is_idempotent() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        h.logout_use_case().execute(&output.session_token).await.unwrap();
        assert_eq!(h.store.session_count(), 0);

        // Second logout with the same token is a no-op success
        h.logout_use_case().execute(&output.session_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_with_garbage_token_succeeds() {
        let h = Harness::new();
        h.logout_use_case().execute("definitely.not-a-token").await.unwrap();
        h.logout_use_case().execute("").await.unwrap();
    }

    #[tokio::test]
    async fn test_logged_out_session_no_longer_authenticates() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        h.logout_use_case().execute(&output.session_token).await.unwrap();

        let err = h
            .current_user_use_case()
            .execute(&output.session_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    #[tokio::test]
    async fn test_delete_all_for_user_clears_every_session() {
        let h = Harness::new();
        let user = h.register("a@x.com").await;

        let first = h.login("a@x.com", PASSWORD).await.unwrap();
        let second = h.login("a@x.com", PASSWORD).await.unwrap();
        assert_ne!(first.session.id, second.session.id);

        let deleted = h.store.delete_all_for_user(&user.id).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(h.store.session_count(), 0);
    }
}

// ============================================================================
// Current user
// ============================================================================

mod current_user_tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_user_and_slides_activity() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        h.clock.advance(Duration::minutes(10));
        let user = h
            .current_user_use_case()
            .execute(&output.session_token)
            .await
            .unwrap();

        assert_eq!(user.email.as_str(), "a@x.com");
        let stored = h.store.stored_session(&output.session.id).unwrap();
        assert_eq!(stored.last_activity_at, h.clock.now());
    }

    #[tokio::test]
    async fn test_rejects_forged_token() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        // Same session id, signed with the wrong secret
        let forged = issue_session_token(&output.session.id, &[9u8; 32]);
        let err = h.current_user_use_case().execute(&forged).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    #[tokio::test]
    async fn test_rejects_unknown_session() {
        let h = Harness::new();
        let token = issue_session_token(&SessionId::new(), &h.config.session_secret);
        let err = h.current_user_use_case().execute(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    #[tokio::test]
    async fn test_idle_session_expires() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        h.clock.advance(Duration::hours(25));
        let err = h
            .current_user_use_case()
            .execute(&output.session_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    #[tokio::test]
    async fn test_activity_keeps_session_alive() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        // Each resolution inside the idle TTL pushes the window forward
        for _ in 0..3 {
            h.clock.advance(Duration::hours(20));
            assert!(
                h.current_user_use_case()
                    .execute(&output.session_token)
                    .await
                    .is_ok()
            );
        }

        h.clock.advance(Duration::hours(25));
        assert!(
            h.current_user_use_case()
                .execute(&output.session_token)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_orphaned_session_is_unauthorized() {
        let h = Harness::new();
        let user = h.register("a@x.com").await;
        let output = h.login("a@x.com", PASSWORD).await.unwrap();

        h.store.remove_user(&user.id);

        let err = h
            .current_user_use_case()
            .execute(&output.session_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
    }

    #[tokio::test]
    async fn test_cleanup_expired_prunes_only_dead_sessions() {
        let h = Harness::new();
        h.register("a@x.com").await;
        let stale = h.login("a@x.com", PASSWORD).await.unwrap();

        h.clock.advance(Duration::hours(25));
        let live = h.login("a@x.com", PASSWORD).await.unwrap();

        let removed = h.store.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(h.store.stored_session(&stale.session.id).is_none());
        assert!(h.store.stored_session(&live.session.id).is_some());
    }
}

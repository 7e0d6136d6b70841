//! Login Use Case
//!
//! Authenticates a user and creates a session.
//!
//! The step order below is load-bearing. Rate limits run before any user
//! lookup, so a rate-limited caller learns nothing about which emails
//! exist and never reaches the (expensive) password verification. Every
//! authentication failure after that returns the same
//! [`AuthError::InvalidCredentials`] value, whether the email is unknown,
//! the password is wrong, or the account is locked.

use std::net::IpAddr;
use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::token::issue_session_token;
use crate::domain::entity::{session::Session, user::User};
use crate::domain::repository::{RateLimiter, SessionRepository, UserRepository};
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Rate-limit action key for login attempts
const LOGIN_ACTION: &str = "login";

/// Login input
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Login output
#[derive(Debug)]
pub struct LoginOutput {
    pub user: User,
    pub session: Session,
    /// Signed bearer token for the session cookie
    pub session_token: String,
}

/// Login use case
pub struct LoginUseCase<U, S, R, C>
where
    U: UserRepository,
    S: SessionRepository,
    R: RateLimiter,
    C: Clock,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    rate_limiter: Arc<R>,
    clock: Arc<C>,
    config: Arc<AuthConfig>,
}

impl<U, S, R, C> LoginUseCase<U, S, R, C>
where
    U: UserRepository,
    S: SessionRepository,
    R: RateLimiter,
    C: Clock,
{
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        rate_limiter: Arc<R>,
        clock: Arc<C>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            rate_limiter,
            clock,
            config,
        }
    }

    pub async fn execute(&self, input: LoginInput) -> AuthResult<LoginOutput> {
        let now = self.clock.now();

        // 1) Per-IP limit, before anything touches the user table
        if let Some(ip) = input.client_ip {
            let result = self
                .rate_limiter
                .check_limit(&ip.to_string(), LOGIN_ACTION, &self.config.login_ip_limit)
                .await?;
            if !result.allowed {
                tracing::warn!(client_ip = %ip, "Login rate limit tripped for IP");
                return Err(AuthError::RateLimited {
                    retry_after_secs: result.retry_after_secs.unwrap_or(1),
                });
            }
        }

        // 2) Per-account limit, keyed by the normalized email as supplied
        let email_key = Email::normalize_key(&input.email);
        let result = self
            .rate_limiter
            .check_limit(&email_key, LOGIN_ACTION, &self.config.login_email_limit)
            .await?;
        if !result.allowed {
            tracing::warn!("Login rate limit tripped for account identifier");
            return Err(AuthError::RateLimited {
                retry_after_secs: result.retry_after_secs.unwrap_or(1),
            });
        }

        // 3) Look up the user. When nothing matches (including malformed
        //    email input), verify against the decoy hash anyway so this
        //    path costs the same as a real verification.
        let raw_password = RawPassword::for_verification(input.password);

        let user = match Email::new(&input.email) {
            Ok(email) => self.user_repo.find_by_email(&email).await?,
            Err(_) => None,
        };

        let Some(mut user) = user else {
            let _ = UserPassword::decoy().verify(&raw_password, self.config.pepper());
            return Err(AuthError::InvalidCredentials);
        };

        // 4) Locked accounts fail with the generic error and mutate nothing
        if user.is_locked(now) {
            tracing::warn!(user_id = %user.id, "Login attempt on locked account");
            return Err(AuthError::InvalidCredentials);
        }

        // 5) Verify password; on failure, persist the bumped counter
        if !user.password_hash.verify(&raw_password, self.config.pepper()) {
            user.record_failed_login(now);
            if user.is_locked(now) {
                tracing::warn!(
                    user_id = %user.id,
                    failed_attempts = user.failed_login_attempts,
                    "Account locked after repeated login failures"
                );
            }
            self.user_repo.save(&user).await?;
            return Err(AuthError::InvalidCredentials);
        }

        // 6) Success: reset counters, create the session
        user.record_successful_login(now, input.client_ip, input.user_agent.clone());
        self.user_repo.save(&user).await?;

        let session = Session::new(user.id, now);
        self.session_repo.save(&session).await?;

        let session_token = issue_session_token(&session.id, &self.config.session_secret);

        tracing::info!(
            user_id = %user.id,
            session_id = %session.id,
            "User logged in"
        );

        Ok(LoginOutput {
            user,
            session,
            session_token,
        })
    }
}

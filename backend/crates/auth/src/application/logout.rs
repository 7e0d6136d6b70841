//! Logout Use Case
//!
//! Invalidates a user session. Idempotent: logging out an unknown,
//! expired, or malformed token is a success, so a client can always
//! clear its cookie. Only storage failures surface as errors.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::token::parse_session_token;
use crate::domain::repository::SessionRepository;
use crate::error::AuthResult;

/// Logout use case
pub struct LogoutUseCase<S>
where
    S: SessionRepository,
{
    session_repo: Arc<S>,
    config: Arc<AuthConfig>,
}

impl<S> LogoutUseCase<S>
where
    S: SessionRepository,
{
    pub fn new(session_repo: Arc<S>, config: Arc<AuthConfig>) -> Self {
        Self {
            session_repo,
            config,
        }
    }

    pub async fn execute(&self, session_token: &str) -> AuthResult<()> {
        let Some(session_id) = parse_session_token(session_token, &self.config.session_secret)
        else {
            tracing::debug!("Logout with unparseable session token, nothing to do");
            return Ok(());
        };

        self.session_repo.delete(&session_id).await?;

        tracing::info!(session_id = %session_id, "User logged out");
        Ok(())
    }
}

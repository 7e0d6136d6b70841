//! Current User Use Case
//!
//! Resolves a session token to its owning user and slides the session's
//! activity window forward.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::token::parse_session_token;
use crate::domain::entity::user::User;
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};

/// Current user use case
pub struct CurrentUserUseCase<U, S, C>
where
    U: UserRepository,
    S: SessionRepository,
    C: Clock,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    clock: Arc<C>,
    config: Arc<AuthConfig>,
}

impl<U, S, C> CurrentUserUseCase<U, S, C>
where
    U: UserRepository,
    S: SessionRepository,
    C: Clock,
{
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        clock: Arc<C>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            clock,
            config,
        }
    }

    pub async fn execute(&self, session_token: &str) -> AuthResult<User> {
        let session_id = parse_session_token(session_token, &self.config.session_secret)
            .ok_or(AuthError::SessionInvalid)?;

        // The repository only returns sessions still inside the idle TTL
        let session = self
            .session_repo
            .find_by_id(&session_id)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        let user = match self.user_repo.find_by_id(&session.user_id).await? {
            Some(user) => user,
            None => {
                // Orphaned session: the row is inconsistent, the caller
                // just isn't authenticated.
                tracing::warn!(
                    session_id = %session.id,
                    user_id = %session.user_id,
                    "Session references missing user"
                );
                return Err(AuthError::SessionInvalid);
            }
        };

        // Slide the activity window; a failed bump must not fail the
        // request that was otherwise authenticated.
        let now = self.clock.now();
        if let Err(e) = self.session_repo.update_activity(&session.id, now).await {
            tracing::warn!(error = %e, session_id = %session.id, "Failed to update session activity");
        }

        Ok(user)
    }
}

//! Register Use Case
//!
//! Creates a new user account. Registration does not sign the user in;
//! login is a separate, explicit step.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Register input
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Register output
#[derive(Debug)]
pub struct RegisterOutput {
    pub user: User,
}

/// Register use case
pub struct RegisterUseCase<U, C>
where
    U: UserRepository,
    C: Clock,
{
    user_repo: Arc<U>,
    clock: Arc<C>,
    config: Arc<AuthConfig>,
}

impl<U, C> RegisterUseCase<U, C>
where
    U: UserRepository,
    C: Clock,
{
    pub fn new(user_repo: Arc<U>, clock: Arc<C>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            clock,
            config,
        }
    }

    pub async fn execute(&self, input: RegisterInput) -> AuthResult<RegisterOutput> {
        // Validate email shape
        let email = Email::new(&input.email)
            .map_err(|e| AuthError::validation("email", e.message().to_string()))?;

        // Confirmation must match before the password is inspected further
        if input.password != input.confirm_password {
            return Err(AuthError::validation(
                "confirm_password",
                "Passwords do not match",
            ));
        }

        // Validate password against the policy
        let raw_password = RawPassword::new(input.password)
            .map_err(|e| AuthError::validation("password", e.message().to_string()))?;

        // Uniqueness pre-check; the database unique index still backstops
        // a concurrent registration racing this.
        if self.user_repo.email_exists(&email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = UserPassword::from_raw(&raw_password, self.config.pepper())
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let user = User::new(email, password_hash, self.clock.now());
        self.user_repo.save(&user).await?;

        tracing::info!(
            user_id = %user.id,
            email_domain = %user.email.domain(),
            "User registered"
        );

        Ok(RegisterOutput { user })
    }
}

//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.
//!
//! Authentication failures are deliberately indistinguishable from the
//! outside: unknown email, wrong password, and locked account all map to
//! the same [`AuthError::InvalidCredentials`] value. Rate limiting is the
//! one explicit failure, since callers need the back-off hint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Caller-supplied data violates a business rule
    #[error("{message}")]
    Validation {
        /// Offending input field (for UI display)
        field: &'static str,
        message: String,
    },

    /// Email is already registered
    #[error("Email is already registered")]
    EmailTaken,

    /// Authentication failed; message is generic to resist enumeration
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Session not found, expired, or token signature invalid
    #[error("Session not found or expired")]
    SessionInvalid,

    /// Too many attempts for this identifier/action
    #[error("Too many attempts, try again later")]
    RateLimited { retry_after_secs: u64 },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Validation error helper
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AuthError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::SessionInvalid => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation { .. } => ErrorKind::UnprocessableEntity,
            AuthError::EmailTaken => ErrorKind::Conflict,
            AuthError::InvalidCredentials | AuthError::SessionInvalid => ErrorKind::Unauthorized,
            AuthError::RateLimited { .. } => ErrorKind::TooManyRequests,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    ///
    /// Server-side errors keep their generic message; nothing internal
    /// (queries, identifiers, stack traces) crosses this boundary.
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::RateLimited { retry_after_secs } => {
                AppError::new(self.kind(), self.to_string()).with_retry_after(*retry_after_secs)
            }
            AuthError::Database(_) | AuthError::Internal(_) => {
                AppError::new(self.kind(), "Internal server error")
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::RateLimited { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Rate limited request");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();

        // Validation carries the offending field for form display
        if let AuthError::Validation { field, message } = &self {
            let status = self.status_code();
            let body = serde_json::json!({
                "type": format!("https://httpstatuses.io/{}", status.as_u16()),
                "title": self.kind().as_str(),
                "status": status.as_u16(),
                "detail": message,
                "field": field,
            });
            return (status, axum::Json(body)).into_response();
        }

        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Business logic, entities, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database and in-memory implementations
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - User registration and login with email + password
//! - Server-side sessions with HMAC-signed cookie tokens
//! - Sliding-window rate limiting per IP and per account
//! - Automatic account lockout after failed login attempts
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Generic authentication errors and a constant-time verification
//!   decoy resist account enumeration
//! - Rate-limit checks precede any user lookup or password hashing
//! - Session ids are unguessable UUIDv4 bearer tokens, HMAC-signed
//!   before they reach a cookie

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::{PgAuthRepository, PgRateLimiter};
pub use presentation::router::{auth_router, auth_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod router {
    pub use crate::presentation::router::*;
}

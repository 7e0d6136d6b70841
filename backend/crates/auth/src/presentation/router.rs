//! Auth Router

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use platform::clock::SystemClock;

use crate::application::config::AuthConfig;
use crate::domain::repository::{RateLimiter, SessionRepository, UserRepository};
use crate::infra::postgres::{PgAuthRepository, PgRateLimiter};
use crate::presentation::handlers::{self, AuthAppState};

/// Create the Auth router with PostgreSQL backends
pub fn auth_router(repo: PgAuthRepository, limiter: PgRateLimiter, config: AuthConfig) -> Router {
    auth_router_generic(repo, limiter, config)
}

/// Create an Auth router for any repository/limiter implementation
pub fn auth_router_generic<R, L>(repo: R, limiter: L, config: AuthConfig) -> Router
where
    R: UserRepository + SessionRepository + Clone + Send + Sync + 'static,
    L: RateLimiter + Clone + Send + Sync + 'static,
{
    let state = AuthAppState {
        repo: Arc::new(repo),
        limiter: Arc::new(limiter),
        clock: Arc::new(SystemClock),
        config: Arc::new(config),
    };

    Router::new()
        .route("/register", post(handlers::register::<R, L>))
        .route("/login", post(handlers::login::<R, L>))
        .route("/logout", post(handlers::logout::<R, L>))
        .route("/me", get(handlers::current_user::<R, L>))
        .with_state(state)
}

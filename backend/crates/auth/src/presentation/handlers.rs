//! HTTP Handlers

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use std::sync::Arc;

use platform::client::extract_client_info;
use platform::clock::SystemClock;
use platform::cookie::CookieConfig;

use crate::application::config::AuthConfig;
use crate::application::{
    CurrentUserUseCase, LoginInput, LoginUseCase, LogoutUseCase, RegisterInput, RegisterUseCase,
};
use crate::domain::repository::{RateLimiter, SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{LoginRequest, RegisterRequest, UserResponse};

/// Shared state for auth handlers
#[derive(Clone)]
pub struct AuthAppState<R, L>
where
    R: UserRepository + SessionRepository + Clone + Send + Sync + 'static,
    L: RateLimiter + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub limiter: Arc<L>,
    pub clock: Arc<SystemClock>,
    pub config: Arc<AuthConfig>,
}

// ============================================================================
// Register
// ============================================================================

/// POST /api/auth/register
pub async fn register<R, L>(
    State(state): State<AuthAppState<R, L>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + SessionRepository + Clone + Send + Sync + 'static,
    L: RateLimiter + Clone + Send + Sync + 'static,
{
    let use_case = RegisterUseCase::new(state.repo.clone(), state.clock.clone(), state.config.clone());

    let output = use_case
        .execute(RegisterInput {
            email: req.email,
            password: req.password,
            confirm_password: req.confirm_password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&output.user))))
}

// ============================================================================
// Login
// ============================================================================

/// POST /api/auth/login
pub async fn login<R, L>(
    State(state): State<AuthAppState<R, L>>,
    headers: HeaderMap,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<std::net::SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + SessionRepository + Clone + Send + Sync + 'static,
    L: RateLimiter + Clone + Send + Sync + 'static,
{
    let client = extract_client_info(&headers, Some(addr.ip()));

    let use_case = LoginUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.limiter.clone(),
        state.clock.clone(),
        state.config.clone(),
    );

    let output = use_case
        .execute(LoginInput {
            email: req.email,
            password: req.password,
            client_ip: client.ip,
            user_agent: client.user_agent,
        })
        .await?;

    let cookie = session_cookie_config(&state.config).build_set_cookie(&output.session_token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(&output.user)),
    ))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /api/auth/logout
pub async fn logout<R, L>(
    State(state): State<AuthAppState<R, L>>,
    headers: HeaderMap,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + SessionRepository + Clone + Send + Sync + 'static,
    L: RateLimiter + Clone + Send + Sync + 'static,
{
    if let Some(token) = extract_session_cookie(&headers, &state.config.session_cookie_name) {
        let use_case = LogoutUseCase::new(state.repo.clone(), state.config.clone());
        use_case.execute(&token).await?;
    }

    let cookie = session_cookie_config(&state.config).build_delete_cookie();

    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

// ============================================================================
// Current User
// ============================================================================

/// GET /api/auth/me
pub async fn current_user<R, L>(
    State(state): State<AuthAppState<R, L>>,
    headers: HeaderMap,
) -> AuthResult<Json<UserResponse>>
where
    R: UserRepository + SessionRepository + Clone + Send + Sync + 'static,
    L: RateLimiter + Clone + Send + Sync + 'static,
{
    let token = extract_session_cookie(&headers, &state.config.session_cookie_name)
        .ok_or(AuthError::SessionInvalid)?;

    let use_case = CurrentUserUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.clock.clone(),
        state.config.clone(),
    );

    let user = use_case.execute(&token).await?;

    Ok(Json(UserResponse::from(&user)))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn extract_session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    platform::cookie::extract_cookie(headers, name)
}

fn session_cookie_config(config: &AuthConfig) -> CookieConfig {
    CookieConfig {
        name: config.session_cookie_name.clone(),
        secure: config.cookie_secure,
        http_only: true,
        same_site: config.cookie_same_site,
        path: "/".to_string(),
        max_age_secs: Some(config.session_ttl.as_secs() as i64),
    }
}

//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::rate_limit::RateLimitConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Session secret key for HMAC signing (32 bytes)
    pub session_secret: [u8; 32],
    /// Session idle TTL: a session dies once inactive this long
    pub session_ttl: Duration,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Login attempts per client IP
    pub login_ip_limit: RateLimitConfig,
    /// Login attempts per account (normalized email), with an explicit
    /// block once tripped so repeat offenders are rejected cheaply
    pub login_email_limit: RateLimitConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "auth_session".to_string(),
            session_secret: [0u8; 32],
            session_ttl: Duration::from_secs(24 * 3600), // 24 hours idle
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
            login_ip_limit: RateLimitConfig::new(10, 60),
            login_email_limit: RateLimitConfig::with_block(5, 300, 900),
        }
    }
}

impl AuthConfig {
    /// Create config with a random session secret (for development)
    pub fn with_random_secret() -> Self {
        let bytes = platform::crypto::random_bytes(32);
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        Self {
            session_secret: secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Get session TTL in milliseconds
    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl.as_millis() as i64
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

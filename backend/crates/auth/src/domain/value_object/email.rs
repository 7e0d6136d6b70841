//! Email Value Object
//!
//! Represents a validated email address. The original casing is preserved
//! for display; a lowercased normalized form is used for uniqueness,
//! lookups, and rate-limit keys. Basic validation only - actual
//! verification is done via email confirmation.

use kernel::error::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// Email address value object
///
/// Equality and hashing use the normalized form, so `User@Example.com`
/// and `user@example.com` are the same identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    original: String,
    normalized: String,
}

impl Email {
    /// Create a new email with validation
    pub fn new(email: impl Into<String>) -> AppResult<Self> {
        let original = email.into().trim().to_string();
        let normalized = original.to_lowercase();

        if normalized.is_empty() {
            return Err(AppError::bad_request("Email cannot be empty"));
        }

        if normalized.len() > EMAIL_MAX_LENGTH {
            return Err(AppError::bad_request(format!(
                "Email must be at most {} characters",
                EMAIL_MAX_LENGTH
            )));
        }

        if !Self::is_valid_format(&normalized) {
            return Err(AppError::bad_request("Invalid email format"));
        }

        Ok(Self {
            original,
            normalized,
        })
    }

    /// Normalization applied to arbitrary caller input when used as a
    /// lookup or rate-limit key (no format validation)
    pub fn normalize_key(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Basic email format validation
    fn is_valid_format(email: &str) -> bool {
        // Must contain exactly one @
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 {
            return false;
        }

        let local = parts[0];
        let domain = parts[1];

        // Local part checks
        if local.is_empty() || local.len() > 64 {
            return false;
        }

        // Domain checks
        if domain.is_empty() || !domain.contains('.') {
            return false;
        }

        // Check domain has valid characters
        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return false;
        }

        // Domain shouldn't start or end with dot or hyphen
        if domain.starts_with('.') || domain.ends_with('.') {
            return false;
        }
        if domain.starts_with('-') || domain.ends_with('-') {
            return false;
        }

        true
    }

    /// Create from database values (assumed already validated)
    pub fn from_db(original: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            normalized: normalized.into(),
        }
    }

    /// Get the email as entered (original casing)
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Get the normalized (lowercased) form
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Get the domain part of the email
    pub fn domain(&self) -> &str {
        self.normalized.split('@').nth(1).unwrap_or("")
    }

    /// Get the local part of the email
    pub fn local_part(&self) -> &str {
        self.normalized.split('@').next().unwrap_or("")
    }
}

impl PartialEq for Email {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Email {}

impl std::hash::Hash for Email {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl FromStr for Email {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Email::new(s)
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.original)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::new("user@example.com").is_ok());
        assert!(Email::new("User@Example.COM").is_ok());
        assert!(Email::new("user.name@example.co.jp").is_ok());
        assert!(Email::new("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_invalid() {
        assert!(Email::new("").is_err());
        assert!(Email::new("userexample.com").is_err());
        assert!(Email::new("user@").is_err());
        assert!(Email::new("@example.com").is_err());
        assert!(Email::new("user@@example.com").is_err());
        assert!(Email::new("user@example").is_err());
    }

    #[test]
    fn test_email_preserves_original_case() {
        let email = Email::new("User@Example.COM").unwrap();
        assert_eq!(email.as_str(), "User@Example.COM");
        assert_eq!(email.normalized(), "user@example.com");
    }

    #[test]
    fn test_email_equality_is_case_insensitive() {
        let a = Email::new("User@Example.COM").unwrap();
        let b = Email::new("user@example.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_email_domain() {
        let email = Email::new("user@example.com").unwrap();
        assert_eq!(email.domain(), "example.com");
        assert_eq!(email.local_part(), "user");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            Email::normalize_key("  User@Example.COM "),
            "user@example.com"
        );
        // Keys are produced even for input that would fail validation,
        // so rate limiting can run before any lookup.
        assert_eq!(Email::normalize_key("Not-An-Email"), "not-an-email");
    }
}

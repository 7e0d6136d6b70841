//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (HMAC, Base64, random bytes)
//! - Password hashing (Argon2id, NIST SP 800-63B compliant)
//! - Sliding-window rate limiting
//! - Time source abstraction
//! - Cookie management
//! - Client identification helpers

pub mod client;
pub mod clock;
pub mod cookie;
pub mod crypto;
pub mod password;
pub mod rate_limit;

//! Infrastructure Layer
//!
//! Database implementations and in-memory backends.

pub mod memory;
pub mod postgres;

pub use memory::MemoryRateLimiter;
pub use postgres::{PgAuthRepository, PgRateLimiter};

//! Session ID Value Object
//!
//! UUIDv4 from the OS CSPRNG; treated as an opaque, high-entropy bearer
//! token and never reused.

use kernel::id::Id;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionMarker;
pub type SessionId = Id<SessionMarker>;

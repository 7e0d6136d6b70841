//! Session Token Signing
//!
//! The cookie value is `<session-uuid>.<base64url(HMAC-SHA256(uuid))>`.
//! The signature is checked in constant time before any repository
//! lookup, so forged cookies never touch storage.

use platform::crypto::{constant_time_eq, from_base64_url, hmac_sha256, to_base64_url};
use uuid::Uuid;

use crate::domain::value_object::session_id::SessionId;

/// Sign a session id into a cookie-safe bearer token
pub fn issue_session_token(session_id: &SessionId, secret: &[u8; 32]) -> String {
    let id = session_id.to_string();
    let signature = hmac_sha256(secret, id.as_bytes());
    format!("{}.{}", id, to_base64_url(&signature))
}

/// Verify a token's signature and recover the session id
///
/// Returns `None` on any structural or signature problem; callers treat
/// that the same as an unknown session.
pub fn parse_session_token(token: &str, secret: &[u8; 32]) -> Option<SessionId> {
    let (id_str, signature_b64) = token.split_once('.')?;

    let signature = from_base64_url(signature_b64).ok()?;
    let expected = hmac_sha256(secret, id_str.as_bytes());

    if !constant_time_eq(&expected, &signature) {
        return None;
    }

    let uuid: Uuid = id_str.parse().ok()?;
    Some(SessionId::from_uuid(uuid))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [7u8; 32];

    #[test]
    fn test_token_roundtrip() {
        let session_id = SessionId::new();
        let token = issue_session_token(&session_id, &SECRET);

        let parsed = parse_session_token(&token, &SECRET);
        assert_eq!(parsed, Some(session_id));
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let session_id = SessionId::new();
        let token = issue_session_token(&session_id, &SECRET);

        let other_secret = [8u8; 32];
        assert!(parse_session_token(&token, &other_secret).is_none());
    }

    #[test]
    fn test_token_rejects_tampered_id() {
        let session_id = SessionId::new();
        let token = issue_session_token(&session_id, &SECRET);

        let (_, signature) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", SessionId::new(), signature);
        assert!(parse_session_token(&forged, &SECRET).is_none());
    }

    #[test]
    fn test_token_rejects_garbage() {
        assert!(parse_session_token("", &SECRET).is_none());
        assert!(parse_session_token("no-dot-here", &SECRET).is_none());
        assert!(parse_session_token("a.b.c", &SECRET).is_none());
        assert!(parse_session_token("not-a-uuid.!!!", &SECRET).is_none());
    }
}

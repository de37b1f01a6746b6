//! Access-token inspection.
//!
//! Access tokens are treated as JWTs when they look like one. Only the `exp`
//! claim is read; signatures are the server's business.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Returns the expiry encoded in a JWT access token.
///
/// Returns `None` for opaque tokens, malformed tokens and tokens without an
/// `exp` claim.
pub fn access_token_expiry(token: &str) -> Option<OffsetDateTime> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    OffsetDateTime::from_unix_timestamp(claims.exp?).ok()
}

/// Returns true if the token carries an expiry at or before `now`.
pub fn is_expired_at(token: &str, now: OffsetDateTime) -> bool {
    access_token_expiry(token).is_some_and(|exp| exp <= now)
}

/// Returns true if the token carries an expiry that has already passed.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, OffsetDateTime::now_utc())
}

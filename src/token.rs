//! Session token decoding and expiry maths

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{CashierError, Result};

/// Claims the client reads from a staff token.
///
/// The backend signs the token; the client never verifies the signature, it only
/// needs `exp` to know when the session ends.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionClaims {
    /// Expires (Unix timestamp, seconds)
    pub exp: i64,
    /// Issued at
    #[serde(default)]
    pub iat: Option<i64>,
    /// Staff id
    #[serde(default, alias = "id", alias = "_id")]
    pub sub: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Decode a JWT and return the claims.
///
/// Does NOT verify the signature. Any malformed token is an invalid session.
pub fn decode_token(token: &str) -> Result<SessionClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CashierError::InvalidSession);
    }

    // Some issuers pad the payload; URL_SAFE_NO_PAD rejects padding.
    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| CashierError::InvalidSession)?;

    serde_json::from_slice(&payload).map_err(|_| CashierError::InvalidSession)
}

/// Current Unix timestamp in seconds
pub fn now() -> i64 {
    now_millis() / 1000
}

/// Current Unix timestamp in milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A token is expired from its `exp` second onwards.
pub fn is_expired(claims: &SessionClaims, now_secs: i64) -> bool {
    now_secs >= claims.exp
}

/// Milliseconds left until `exp`. Zero or negative once expired.
pub fn millis_until_expiry(claims: &SessionClaims, now_ms: i64) -> i64 {
    claims.exp.saturating_mul(1000).saturating_sub(now_ms)
}

/// What the expiry watcher should do with a token right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryPlan {
    /// Token could not be decoded
    Invalid,
    /// Already past `exp`
    Elapsed,
    /// Log out after this long
    In(Duration),
}

pub fn expiry_plan(token: &str, now_ms: i64) -> ExpiryPlan {
    let Ok(claims) = decode_token(token) else {
        return ExpiryPlan::Invalid;
    };

    let delay = millis_until_expiry(&claims, now_ms);
    if delay <= 0 {
        ExpiryPlan::Elapsed
    } else {
        ExpiryPlan::In(Duration::from_millis(delay as u64))
    }
}

//! Password-reset tokens.
//!
//! A token is `<issued-at, base36>-<HMAC-SHA256, base64url>`. The MAC key is
//! the server secret and the MAC covers the user id, the user's *current*
//! password hash and the issue timestamp. Nothing is stored: changing the
//! password changes the hash, which invalidates every outstanding token for
//! that user, including the one just redeemed. This is the only revocation
//! path; there is no denylist.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::UserRecord;

type HmacSha256 = Hmac<Sha256>;

/// Issue a reset token for `user` stamped with `now`.
pub fn make_reset_token(
    user: &UserRecord,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let timestamp = now.timestamp();
    let mac = signature(user, timestamp, secret)?;
    let digest = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}-{digest}", to_base36(timestamp)))
}

/// Check a reset token against the user's current state.
///
/// Fails for malformed tokens, tokens issued for another user or before the
/// latest password change, tokens stamped in the future, and tokens older
/// than `ttl`.
pub fn check_reset_token(
    user: &UserRecord,
    token: &str,
    secret: &[u8],
    ttl: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some((ts_part, digest_part)) = token.split_once('-') else {
        return false;
    };
    let Some(timestamp) = from_base36(ts_part) else {
        return false;
    };
    let Ok(digest) = URL_SAFE_NO_PAD.decode(digest_part) else {
        return false;
    };

    let age = now.timestamp() - timestamp;
    if age < 0 || age > ttl.num_seconds() {
        return false;
    }

    match signature(user, timestamp, secret) {
        Ok(mac) => mac.verify_slice(&digest).is_ok(),
        Err(_) => false,
    }
}

fn signature(user: &UserRecord, timestamp: i64, secret: &[u8]) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::Internal(format!("hmac key: {e}")))?;
    mac.update(user.id.as_bytes());
    mac.update(user.password_hash.as_bytes());
    mac.update(&timestamp.to_be_bytes());
    Ok(mac)
}

/// Encode a user id for the `uid` query parameter of a reset link.
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Inverse of [`encode_uid`]. `None` for anything that is not an encoded UUID.
pub fn decode_uid(uid: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uid).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Uuid::parse_str(&text).ok()
}

fn to_base36(mut value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(text: &str) -> Option<i64> {
    if text.is_empty() || text.len() > 13 {
        return None;
    }
    i64::from_str_radix(text, 36).ok().filter(|v| *v >= 0)
}

//! Session JWT generation and verification.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{TokenClaims, TokenKind};

/// Generate a signed session token (HS256).
pub fn generate_token(
    user_id: Uuid,
    is_active: bool,
    kind: TokenKind,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        is_active,
        token_type: kind,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Check signature and expiry, returning the claims.
pub fn decode_token(token: &str, secret: &[u8]) -> Result<TokenClaims, AuthError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<TokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        })
}

/// Verify an access token and return the user id it was issued for.
///
/// Refresh tokens and tokens carrying `is_active = false` are rejected even
/// when the signature and expiry are fine.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<Uuid, AuthError> {
    let claims = decode_token(token, secret)?;
    if claims.token_type != TokenKind::Access {
        return Err(AuthError::TokenInvalid);
    }
    if !claims.is_active {
        return Err(AuthError::InactiveAccount);
    }
    subject(&claims)
}

/// Verify a refresh token and return the user id it was issued for.
pub fn verify_refresh_token(token: &str, secret: &[u8]) -> Result<Uuid, AuthError> {
    let claims = decode_token(token, secret)?;
    if claims.token_type != TokenKind::Refresh {
        return Err(AuthError::TokenInvalid);
    }
    subject(&claims)
}

fn subject(claims: &TokenClaims) -> Result<Uuid, AuthError> {
    Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("carelink")
        .join("jwt-secret")
}

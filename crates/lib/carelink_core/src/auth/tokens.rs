//! Token service: session token pairs and password-reset tokens under one
//! server secret.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{AuthError, jwt, reset};
use crate::models::auth::{TokenKind, TokenPair, UserRecord};

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 1 day.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Reset token lifetime: 24 hours.
pub const DEFAULT_RESET_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Token lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            reset_ttl: Duration::seconds(DEFAULT_RESET_TOKEN_TTL_SECS),
        }
    }
}

/// Issues and verifies every token kind. Cheap to clone.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<[u8]>,
    settings: TokenSettings,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, settings: TokenSettings) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            settings,
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Issue an access + refresh pair. Inactive users get nothing.
    pub fn issue_session(&self, user: &UserRecord) -> Result<TokenPair, AuthError> {
        let access = self.issue_access(user)?;
        let refresh = jwt::generate_token(
            user.id,
            user.is_active,
            TokenKind::Refresh,
            self.settings.refresh_ttl,
            &self.secret,
        )?;
        Ok(TokenPair { access, refresh })
    }

    /// Issue a fresh access token only.
    pub fn issue_access(&self, user: &UserRecord) -> Result<String, AuthError> {
        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }
        jwt::generate_token(
            user.id,
            user.is_active,
            TokenKind::Access,
            self.settings.access_ttl,
            &self.secret,
        )
    }

    pub fn verify_access(&self, token: &str) -> Result<Uuid, AuthError> {
        jwt::verify_access_token(token, &self.secret)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Uuid, AuthError> {
        jwt::verify_refresh_token(token, &self.secret)
    }

    pub fn issue_reset_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        reset::make_reset_token(user, &self.secret, Utc::now())
    }

    pub fn verify_reset_token(&self, user: &UserRecord, token: &str) -> bool {
        self.verify_reset_token_at(user, token, Utc::now())
    }

    pub fn verify_reset_token_at(&self, user: &UserRecord, token: &str, now: DateTime<Utc>) -> bool {
        reset::check_reset_token(user, token, &self.secret, self.settings.reset_ttl, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(active: bool) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::now_v7(),
            email: "a@x.com".into(),
            password_hash: "hash-1".into(),
            first_name: None,
            last_name: None,
            date_of_birth: None,
            is_active: active,
            is_admin: false,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn service() -> TokenService {
        TokenService::new("test-secret", TokenSettings::default())
    }

    #[test]
    fn session_pair_verifies_to_user() {
        let svc = service();
        let u = user(true);
        let pair = svc.issue_session(&u).unwrap();
        assert_ne!(pair.access, pair.refresh);
        assert_eq!(svc.verify_access(&pair.access).unwrap(), u.id);
        assert_eq!(svc.verify_refresh(&pair.refresh).unwrap(), u.id);
    }

    #[test]
    fn inactive_user_gets_no_session() {
        assert!(matches!(
            service().issue_session(&user(false)),
            Err(AuthError::InactiveAccount)
        ));
    }

    #[test]
    fn services_with_different_secrets_disagree() {
        let u = user(true);
        let pair = service().issue_session(&u).unwrap();
        let other = TokenService::new("another-secret", TokenSettings::default());
        assert!(other.verify_access(&pair.access).is_err());
    }

    #[test]
    fn reset_token_honours_configured_ttl() {
        let svc = TokenService::new(
            "test-secret",
            TokenSettings {
                reset_ttl: Duration::minutes(30),
                ..TokenSettings::default()
            },
        );
        let u = user(true);
        let token = svc.issue_reset_token(&u).unwrap();
        assert!(svc.verify_reset_token(&u, &token));
        assert!(!svc.verify_reset_token_at(&u, &token, Utc::now() + Duration::minutes(31)));
    }
}

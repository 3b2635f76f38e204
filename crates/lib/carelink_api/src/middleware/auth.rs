//! Authentication middleware: Bearer token extraction, JWT verification and
//! the admin capability guard.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use carelink_core::auth::AuthError;
use carelink_core::models::auth::UserRecord;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// The caller's current user record, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserRecord);

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve an access token to a live, active user.
///
/// The token's own claims are checked first; the store is then consulted so
/// that a user deactivated or deleted after issue is refused immediately.
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<UserRecord> {
    let user_id = state.tokens.verify_access(token).map_err(|e| {
        debug!(error = %e, "access token rejected");
        match e {
            AuthError::InactiveAccount => AppError::from(e),
            _ => AppError::Unauthorized("Invalid or expired token.".into()),
        }
    })?;

    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token.".into()))?;

    if !user.is_active {
        return Err(AuthError::InactiveAccount.into());
    }
    Ok(user)
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies it,
/// and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".into())
        })?
        .to_string();

    let user = authenticate(&state, &token).await?;
    request.extensions_mut().insert(AuthenticatedUser(user));

    Ok(next.run(request).await)
}

/// Capability check: only admins pass.
pub fn admin_only(user: &AuthenticatedUser) -> AppResult<()> {
    if user.0.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Permission denied. Admin access required.".into(),
        ))
    }
}

/// Axum middleware applying [`admin_only`]. Must run after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".into())
        })?;
    admin_only(user)?;
    Ok(next.run(request).await)
}

//! Authentication flows: login, registration, refresh, password change and
//! password reset.
//!
//! Login never tells "no such user" apart from "wrong password". The reset
//! request, on the other hand, answers 404 for unknown emails; that endpoint
//! favours usability over enumeration resistance.

use carelink_core::auth::password::{hash_password, verify_password};
use carelink_core::auth::reset::{decode_uid, encode_uid};
use carelink_core::models::auth::{NewUser, TokenPair, User, UserRecord};
use carelink_core::store::normalize_email;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::RegisterRequest;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

fn validate_email(email: &str) -> AppResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("Enter a valid email address.".into()))
    }
}

fn validate_new_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Best-effort side effects after a password mutation. Failures are logged only.
async fn announce_password_change(state: &AppState, user: &UserRecord, message: &str) {
    if let Err(e) = state
        .mailer
        .send_email("Password changed", message, &user.email)
        .await
    {
        warn!(user_id = %user.id, error = %e, "password confirmation email failed");
    }
    state.publisher.publish(user.id, message).await;
}

/// Authenticate with email + password.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<TokenPair> {
    let user = match state.store.find_by_email(email).await? {
        // Generic error for wrong email.
        None => return Err(AppError::InvalidCredentials),
        Some(u) => u,
    };

    // Generic error for wrong password; an unreadable hash counts as a mismatch.
    if !matches!(verify_password(password, &user.password_hash), Ok(true)) {
        return Err(AppError::InvalidCredentials);
    }

    let pair = state.tokens.issue_session(&user)?;
    info!(user_id = %user.id, "login succeeded");
    Ok(pair)
}

/// Register a new user account. The store makes the first user ever an admin.
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<User> {
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_new_password(&req.password)?;

    let password_hash = hash_password(&req.password)?;

    let record = state
        .store
        .create(NewUser {
            email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            date_of_birth: req.date_of_birth,
        })
        .await?;

    if record.is_admin {
        info!(user_id = %record.id, "first user granted admin role");
    }
    info!(user_id = %record.id, "user registered");
    Ok(User::from(&record))
}

/// Exchange a refresh token for a new access token.
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<String> {
    let user_id = state
        .tokens
        .verify_refresh(refresh_token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired refresh token.".into()))?;

    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token.".into()))?;

    Ok(state.tokens.issue_access(&user)?)
}

/// Change the password of an authenticated user after re-checking the old one.
pub async fn change_password(
    state: &AppState,
    user: &UserRecord,
    old_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> AppResult<()> {
    if new_password != confirm_password {
        return Err(AppError::Validation(
            "New password and confirm password do not match.".into(),
        ));
    }
    validate_new_password(new_password)?;

    if !matches!(verify_password(old_password, &user.password_hash), Ok(true)) {
        return Err(AppError::Validation("Incorrect password.".into()));
    }

    let new_hash = hash_password(new_password)?;
    // The conditional write fails if the password moved since the middleware
    // loaded `user`; the old password was checked against a stale hash.
    if !state
        .store
        .update_password(user.id, &user.password_hash, &new_hash)
        .await?
    {
        return Err(AppError::Validation("Incorrect password.".into()));
    }

    info!(user_id = %user.id, "password changed");
    announce_password_change(state, user, "Your password has been changed.").await;
    Ok(())
}

/// Email a password-reset link to the owner of `email`.
pub async fn send_reset_mail(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email);
    validate_email(&email)?;

    let user = state
        .store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    let token = state.tokens.issue_reset_token(&user)?;
    let link = format!(
        "{}?uid={}&token={}",
        state.config.reset_password_url,
        encode_uid(user.id),
        token
    );
    let body = format!("Please reset your password by clicking on the following link: {link}");

    state
        .mailer
        .send_email("Password reset", &body, &user.email)
        .await
        .map_err(|e| AppError::Internal(format!("reset email: {e}")))?;

    info!(user_id = %user.id, "password reset email sent");
    state
        .publisher
        .publish(user.id, "A password reset email has been sent.")
        .await;
    Ok(())
}

/// Redeem a reset token and set a new password.
///
/// Writing the new hash invalidates this token and every other outstanding
/// reset token for the user, so a second redemption fails.
pub async fn reset_password(
    state: &AppState,
    uid: Option<&str>,
    token: Option<&str>,
    password: &str,
    password2: &str,
) -> AppResult<()> {
    if password != password2 {
        return Err(AppError::Validation("Passwords do not match.".into()));
    }
    validate_new_password(password)?;

    let (Some(uid), Some(token)) = (uid, token) else {
        return Err(AppError::TokenInvalid);
    };
    let user_id = decode_uid(uid).ok_or(AppError::TokenInvalid)?;

    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;

    if !state.tokens.verify_reset_token(&user, token) {
        return Err(AppError::TokenInvalid);
    }

    let new_hash = hash_password(password)?;
    // Two concurrent redemptions of one token: only the first write matches.
    if !state
        .store
        .update_password(user.id, &user.password_hash, &new_hash)
        .await?
    {
        return Err(AppError::TokenInvalid);
    }

    info!(user_id = %user.id, "password reset");
    announce_password_change(state, &user, "Your password has been reset.").await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        for ok in ["a@x.com", "first.last@sub.example.org"] {
            assert!(validate_email(ok).is_ok(), "{ok}");
        }
        for bad in ["", "a", "@x.com", "a@", "a@x", "a@.com", "a@x.", "a b@x.com"] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn password_length() {
        assert!(validate_new_password("1234567").is_err());
        assert!(validate_new_password("12345678").is_ok());
    }
}

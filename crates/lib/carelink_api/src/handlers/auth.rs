//! Authentication request handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use carelink_core::models::auth::{TokenPair, User};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AccessTokenResponse, ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest,
    RegisterRequest, ResetPasswordQuery, ResetPasswordRequest, SendResetMailRequest,
    StatusResponse,
};
use crate::services::auth;

/// `POST /user/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<TokenPair>> {
    let Json(body) = body?;
    let pair = auth::login(&state, &body.email, &body.password).await?;
    Ok(Json(pair))
}

/// `POST /user/register`: create a new user account.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<User>> {
    let Json(body) = body?;
    let user = auth::register(&state, body).await?;
    Ok(Json(user))
}

/// `POST /user/token/refresh`: exchange a refresh token for a new access token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Json<AccessTokenResponse>> {
    let Json(body) = body?;
    let access = auth::refresh(&state, &body.refresh).await?;
    Ok(Json(AccessTokenResponse { access }))
}

/// `GET /user/me`: the caller's profile.
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<User> {
    Json(User::from(&user.0))
}

/// `POST /user/changePassword`
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AppResult<Json<StatusResponse>> {
    let Json(body) = body?;
    auth::change_password(
        &state,
        &user.0,
        &body.old_password,
        &body.new_password,
        &body.confirm_password,
    )
    .await?;
    Ok(Json(StatusResponse {
        status: "success".into(),
        message: "Password updated successfully".into(),
    }))
}

/// `POST /user/send-mail-reset-password`
pub async fn send_reset_mail_handler(
    State(state): State<AppState>,
    body: Result<Json<SendResetMailRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Json(body) = body?;
    auth::send_reset_mail(&state, &body.email).await?;
    Ok(Json(MessageResponse::new(
        "Password reset link sent. Please check your email.",
    )))
}

/// `POST /user/reset-password?uid=..&token=..`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    query: Result<Query<ResetPasswordQuery>, QueryRejection>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let Json(body) = body?;
    auth::reset_password(
        &state,
        query.uid.as_deref(),
        query.token.as_deref(),
        &body.password,
        &body.password2,
    )
    .await?;
    Ok(Json(MessageResponse::new("Password reset complete.")))
}

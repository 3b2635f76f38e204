//! Admin user management handlers.

use axum::Json;
use axum::extract::rejection::PathRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use carelink_core::models::auth::User;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::services::users;

/// `GET /user`: list all users.
pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(users::list_users(&state).await?))
}

/// `DELETE /user/{id}`: soft-delete a user.
pub async fn delete_user_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id.map_err(|_| AppError::NotFound("User not found.".into()))?;
    users::delete_user(&state, &admin.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Admin user management.

use carelink_core::models::auth::{User, UserRecord};
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Every live user, oldest first.
pub async fn list_users(state: &AppState) -> AppResult<Vec<User>> {
    let users = state.store.list().await?;
    Ok(users.iter().map(User::from).collect())
}

/// Soft-delete `target`. An admin cannot delete their own account.
pub async fn delete_user(state: &AppState, admin: &UserRecord, target: Uuid) -> AppResult<()> {
    if admin.id == target {
        return Err(AppError::Validation(
            "You cannot delete your own account.".into(),
        ));
    }
    state.store.soft_delete(target).await?;
    info!(admin_id = %admin.id, user_id = %target, "user deleted");
    Ok(())
}

//! Notification payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message addressed to every open connection of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub user_id: Uuid,
    pub message: String,
}

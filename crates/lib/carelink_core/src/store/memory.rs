//! In-memory credential store.
//!
//! Intended for tests and database-less local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, UserStore, normalize_email};
use crate::models::auth::{NewUser, UserRecord};
use crate::uuid::uuidv7;

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the active flag of a user. Account activation has no HTTP
    /// surface, so tests and local tooling go through here.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .filter(|u| !u.deleted)
            .ok_or(StoreError::NotFound)?;
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| !u.deleted && u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| !u.deleted).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let email = normalize_email(&user.email);
        let mut users = self.users.write().await;
        if users.values().any(|u| !u.deleted && u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }

        let is_admin = !users.values().any(|u| u.is_admin);
        let now = Utc::now();
        let record = UserRecord {
            id: uuidv7(),
            email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            date_of_birth: user.date_of_birth,
            is_active: true,
            is_admin,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users
            .get_mut(&id)
            .filter(|u| !u.deleted && u.password_hash == expected_hash)
        else {
            return Ok(false);
        };
        user.password_hash = new_hash.to_string();
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let users = self.users.read().await;
        let mut live: Vec<UserRecord> = users.values().filter(|u| !u.deleted).cloned().collect();
        live.sort_by_key(|u| (u.created_at, u.id));
        Ok(live)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .filter(|u| !u.deleted)
            .ok_or(StoreError::NotFound)?;
        user.deleted = true;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().filter(|u| !u.deleted).count() as i64)
    }
}

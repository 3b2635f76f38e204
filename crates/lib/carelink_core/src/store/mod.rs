//! Credential store.
//!
//! The only shared mutable state crossing request boundaries. Every lookup
//! skips soft-deleted users and compares emails in normalised form.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{NewUser, UserRecord};

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("User not found")]
    NotFound,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Persistence for user identities.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup among non-deleted users.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a user. Fails with [`StoreError::DuplicateEmail`] when a live
    /// user already owns the email.
    ///
    /// The user is made admin only if no admin, live or soft-deleted, has
    /// ever existed. The check and the insert are one atomic step, so
    /// concurrent first registrations yield exactly one admin.
    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Replace the password hash in a single-row write, but only while the
    /// stored hash still equals `expected_hash`.
    ///
    /// Returns `false` when the hash changed underneath the caller.
    async fn update_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        new_hash: &str,
    ) -> Result<bool, StoreError>;

    /// All non-deleted users, oldest first.
    async fn list(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Mark a user deleted. Fails with [`StoreError::NotFound`] if no live
    /// user has that id.
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Number of non-deleted users.
    async fn count(&self) -> Result<i64, StoreError>;
}

/// Canonical form used for storing and comparing emails.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }
}

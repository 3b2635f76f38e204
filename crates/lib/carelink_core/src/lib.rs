//! # carelink_core
//!
//! Core domain logic for Carelink: credential storage, password hashing,
//! session and password-reset tokens, mail delivery, attachment validation
//! and the per-user notification registry.

pub mod attachments;
pub mod auth;
pub mod mail;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

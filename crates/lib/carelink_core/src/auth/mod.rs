//! Authentication primitives.
//!
//! Password hashing, session JWTs and password-reset tokens. The HTTP-facing
//! flows that combine these live in `carelink_api::services::auth`.

pub mod jwt;
pub mod password;
pub mod reset;
pub mod tokens;

use thiserror::Error;

pub use tokens::{TokenService, TokenSettings};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    InactiveAccount,

    #[error("Token is invalid")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Internal error: {0}")]
    Internal(String),
}

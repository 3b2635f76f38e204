//! API server configuration.

use std::str::FromStr;

use carelink_core::auth::TokenSettings;
use carelink_core::auth::jwt::resolve_jwt_secret;
use carelink_core::auth::tokens::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS, DEFAULT_RESET_TOKEN_TTL_SECS,
};
use chrono::Duration;

/// SMTP settings. Absent means mail is logged instead of sent.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Signing secret for session and reset tokens.
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub reset_token_ttl_secs: i64,
    /// Front-end page receiving `?uid=&token=` from the reset email.
    pub reset_password_url: String,
    pub smtp: Option<SmtpConfig>,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                 | Default                                  |
    /// |--------------------------|------------------------------------------|
    /// | `BIND_ADDR`              | `127.0.0.1:8000`                         |
    /// | `DATABASE_URL`           | `postgres://localhost:5432/carelink`     |
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file        |
    /// | `ACCESS_TOKEN_TTL_SECS`  | `900`                                    |
    /// | `REFRESH_TOKEN_TTL_SECS` | `86400`                                  |
    /// | `RESET_TOKEN_TTL_SECS`   | `86400`                                  |
    /// | `RESET_PASSWORD_URL`     | `http://localhost:3000/reset-password`   |
    /// | `SMTP_HOST` + `SMTP_USERNAME` + `SMTP_PASSWORD` + `MAIL_FROM` | unset |
    pub fn from_env() -> Self {
        let smtp = match (
            std::env::var("SMTP_HOST"),
            std::env::var("SMTP_USERNAME"),
            std::env::var("SMTP_PASSWORD"),
            std::env::var("MAIL_FROM"),
        ) {
            (Ok(host), Ok(username), Ok(password), Ok(from)) if !host.is_empty() => {
                Some(SmtpConfig {
                    host,
                    username,
                    password,
                    from,
                })
            }
            _ => None,
        };

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/carelink".into()),
            jwt_secret: resolve_jwt_secret(),
            access_token_ttl_secs: env_or("ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl_secs: env_or(
                "REFRESH_TOKEN_TTL_SECS",
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            ),
            reset_token_ttl_secs: env_or("RESET_TOKEN_TTL_SECS", DEFAULT_RESET_TOKEN_TTL_SECS),
            reset_password_url: std::env::var("RESET_PASSWORD_URL")
                .unwrap_or_else(|_| "http://localhost:3000/reset-password".into()),
            smtp,
        }
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl: Duration::seconds(self.access_token_ttl_secs),
            refresh_ttl: Duration::seconds(self.refresh_token_ttl_secs),
            reset_ttl: Duration::seconds(self.reset_token_ttl_secs),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

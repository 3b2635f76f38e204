//! Shared fixtures for the API integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use carelink_api::config::ApiConfig;
use carelink_api::{AppState, router};
use carelink_core::mail::{MailError, Mailer};
use carelink_core::notify::ConnectionRegistry;
use carelink_core::store::MemoryUserStore;
use serde_json::Value;
use tower::ServiceExt;

pub const RESET_URL: &str = "http://front.test/reset-password";

#[derive(Debug, Clone)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

/// Keeps every message instead of sending it. Can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: Mutex<bool>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
    ) -> Result<(), MailError> {
        if *self.fail.lock().unwrap() {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(SentMail {
            subject: subject.into(),
            body: body.into(),
            recipient: recipient.into(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryUserStore>,
    pub mailer: Arc<RecordingMailer>,
    pub registry: Arc<ConnectionRegistry>,
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: "postgres://unused".into(),
        jwt_secret: "test-secret".into(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 86_400,
        reset_token_ttl_secs: 86_400,
        reset_password_url: RESET_URL.into(),
        smtp: None,
    }
}

impl TestApp {
    /// Memory store, recording mailer, in-process publisher.
    pub fn new() -> Self {
        let store = Arc::new(MemoryUserStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let registry = Arc::new(ConnectionRegistry::new());
        let state = AppState::new(
            store.clone(),
            mailer.clone(),
            registry.clone(),
            registry.clone(),
            test_config(),
        );
        Self {
            state,
            store,
            mailer,
            registry,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router().oneshot(req).await.expect("request");
        read_json(resp).await
    }

    /// Register a user and return their id.
    pub async fn register(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/user/register",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["id"].as_str().expect("id").to_string()
    }

    /// Log in and return `(access, refresh)`.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/user/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        (
            body["access"].as_str().expect("access").to_string(),
            body["refresh"].as_str().expect("refresh").to_string(),
        )
    }
}

pub async fn read_json(resp: Response<Body>) -> (StatusCode, Value) {
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json)
}

/// Pull `(uid, token)` out of a reset email body.
pub fn reset_params(body: &str) -> (String, String) {
    let query = body
        .split_once('?')
        .map(|(_, q)| q.trim())
        .expect("reset link");
    let mut uid = None;
    let mut token = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("uid", v)) => uid = Some(v.to_string()),
            Some(("token", v)) => token = Some(v.to_string()),
            _ => {}
        }
    }
    (uid.expect("uid"), token.expect("token"))
}

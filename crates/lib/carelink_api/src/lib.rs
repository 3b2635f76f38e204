//! # carelink_api
//!
//! HTTP and WebSocket API library for Carelink.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use carelink_core::auth::TokenService;
use carelink_core::mail::Mailer;
use carelink_core::notify::{ConnectionRegistry, EventPublisher};
use carelink_core::store::UserStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, notifications};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Credential store.
    pub store: Arc<dyn UserStore>,
    /// Session and reset tokens.
    pub tokens: TokenService,
    /// Outgoing mail.
    pub mailer: Arc<dyn Mailer>,
    /// Where events for a user are published.
    pub publisher: Arc<dyn EventPublisher>,
    /// Connections held by this process.
    pub registry: Arc<ConnectionRegistry>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        publisher: Arc<dyn EventPublisher>,
        registry: Arc<ConnectionRegistry>,
        config: ApiConfig,
    ) -> Self {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.token_settings());
        Self {
            store,
            tokens,
            mailer,
            publisher,
            registry,
            config,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required). The notification socket authenticates
    // during its own handshake.
    let public = Router::new()
        .route(routes::POST_USER_LOGIN, post(auth::login_handler))
        .route(routes::POST_USER_REGISTER, post(auth::register_handler))
        .route(routes::POST_USER_TOKEN_REFRESH, post(auth::refresh_handler))
        .route(
            routes::POST_USER_SEND_MAIL_RESET_PASSWORD,
            post(auth::send_reset_mail_handler),
        )
        .route(
            routes::POST_USER_RESET_PASSWORD,
            post(auth::reset_password_handler),
        )
        .route(
            routes::GET_WS_NOTIFICATIONS,
            get(notifications::notifications_handler),
        );

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_USER_ME, get(auth::me_handler))
        .route(
            routes::POST_USER_CHANGE_PASSWORD,
            post(auth::change_password_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin routes: the guard runs after authentication.
    let admin = Router::new()
        .route(routes::GET_USERS, get(admin::list_users_handler))
        .route(routes::DELETE_USER_ID, delete(admin::delete_user_handler))
        .route_layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! Notification WebSocket.
//!
//! `GET /ws/notifications/` upgrades to a WebSocket that pushes every message
//! published for the caller as one text frame. The access token comes from
//! the `Authorization` header or, for browsers that cannot set headers, the
//! `token` query parameter. Unauthenticated handshakes are refused with 401
//! before the upgrade.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use carelink_core::notify::Subscription;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use crate::AppState;
use crate::error::AppError;
use crate::middleware::auth::{authenticate, bearer_token};

#[derive(Debug, Default, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// `GET /ws/notifications/`
pub async fn notifications_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<WsAuthQuery>, QueryRejection>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer_token(&headers)
        .map(str::to_owned)
        .or_else(|| query.ok().and_then(|Query(q)| q.token))
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return AppError::Unauthorized("Authentication credentials were not provided.".into())
            .into_response();
    };

    let user = match authenticate(&state, &token).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    // Register before upgrading so nothing published after a successful
    // handshake is missed. If the upgrade fails the callback is dropped
    // unrun, and dropping the subscription unregisters it.
    let subscription = state.registry.register(user.id);
    info!(user_id = %user.id, connection_id = %subscription.connection_id, "notification socket opened");

    ws.on_failed_upgrade(|e| debug!(error = %e, "notification socket upgrade failed"))
        .on_upgrade(move |socket| serve_connection(socket, subscription))
}

async fn serve_connection(socket: WebSocket, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.receiver.recv() => {
                let Some(message) = event else { break };
                if sender.send(Message::Text(message.into())).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    // Client frames carry nothing; only a close matters.
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    debug!(
        user_id = %subscription.user_id,
        connection_id = %subscription.connection_id,
        "notification socket closed"
    );
}

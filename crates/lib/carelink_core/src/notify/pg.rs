//! Cross-process fan-out over PostgreSQL `LISTEN`/`NOTIFY`.
//!
//! Every server process runs [`run_pg_relay`], which forwards events from the
//! shared channel to its local [`ConnectionRegistry`]. Publishing through
//! [`PgNotifyPublisher`] therefore reaches a user's connections regardless of
//! which process holds the socket.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ConnectionRegistry, EventPublisher};
use crate::models::notify::NotificationEvent;

/// PostgreSQL notification channel carrying [`NotificationEvent`] JSON.
pub const NOTIFY_CHANNEL: &str = "user_notifications";

/// Publishes by `pg_notify`; payloads are limited to 8000 bytes by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgNotifyPublisher {
    pool: PgPool,
}

impl PgNotifyPublisher {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventPublisher for PgNotifyPublisher {
    async fn publish(&self, user_id: Uuid, message: &str) {
        let payload = match encode_payload(user_id, message) {
            Ok(p) => p,
            Err(e) => {
                warn!(%user_id, error = %e, "could not encode notification");
                return;
            }
        };
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(payload)
            .execute(&self.pool)
            .await
        {
            warn!(%user_id, error = %e, "pg_notify failed, notification dropped");
        }
    }
}

/// Forward events from [`NOTIFY_CHANNEL`] to the local registry until the
/// listener fails.
pub async fn run_pg_relay(
    pool: &PgPool,
    registry: Arc<ConnectionRegistry>,
) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(NOTIFY_CHANNEL).await?;
    info!(channel = NOTIFY_CHANNEL, "notification relay listening");

    loop {
        let notification = listener.recv().await?;
        relay_payload(&registry, notification.payload());
    }
}

/// JSON payload carried on [`NOTIFY_CHANNEL`].
pub fn encode_payload(user_id: Uuid, message: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&NotificationEvent {
        user_id,
        message: message.to_string(),
    })
}

pub fn decode_payload(payload: &str) -> Result<NotificationEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

/// Deliver one channel payload to the local registry, returning how many
/// connections received it. Malformed payloads are logged and skipped.
pub fn relay_payload(registry: &ConnectionRegistry, payload: &str) -> usize {
    match decode_payload(payload) {
        Ok(event) => {
            let delivered = registry.deliver(event.user_id, &event.message);
            debug!(user_id = %event.user_id, delivered, "relayed notification");
            delivered
        }
        Err(e) => {
            warn!(error = %e, "ignoring malformed notification payload");
            0
        }
    }
}

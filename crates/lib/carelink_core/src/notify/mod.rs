//! Per-user notification fan-out.
//!
//! Callers hand a message and a user id to an [`EventPublisher`]; every
//! connection currently registered for that user in the
//! [`ConnectionRegistry`] receives it. Delivery is at-most-once and
//! fire-and-forget: nothing is queued for users with no open connection.

pub mod pg;
pub mod registry;

use async_trait::async_trait;
use uuid::Uuid;

pub use pg::{
    NOTIFY_CHANNEL, PgNotifyPublisher, decode_payload, encode_payload, relay_payload, run_pg_relay,
};
pub use registry::{ConnectionId, ConnectionRegistry, Subscription};

/// Fans a message out to a user's open connections.
///
/// Publishing never fails from the caller's point of view; delivery problems
/// are logged by the implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, user_id: Uuid, message: &str);
}

//! In-process registry of open notification connections.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::EventPublisher;
use crate::uuid::uuidv7;

pub type ConnectionId = Uuid;

/// Receiving half handed to a newly registered connection. Dropping it
/// removes the connection from the registry, whether or not it was ever
/// served.
#[derive(Debug)]
pub struct Subscription {
    pub user_id: Uuid,
    pub connection_id: ConnectionId,
    pub receiver: mpsc::UnboundedReceiver<String>,
    registry: Arc<ConnectionRegistry>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.user_id, self.connection_id);
    }
}

/// Maps user id → live connections. Each connection owns its own channel, so
/// every connection sees events in publish order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    groups: DashMap<Uuid, HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the user's group.
    pub fn register(self: &Arc<Self>, user_id: Uuid) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = uuidv7();
        self.groups
            .entry(user_id)
            .or_default()
            .insert(connection_id, tx);
        debug!(%user_id, %connection_id, "connection registered");
        Subscription {
            user_id,
            connection_id,
            receiver: rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a connection. Empty groups are dropped. Removing an unknown
    /// connection is a no-op.
    pub fn unregister(&self, user_id: Uuid, connection_id: ConnectionId) {
        let removed = match self.groups.get_mut(&user_id) {
            Some(mut group) => group.remove(&connection_id).is_some(),
            None => false,
        };
        self.groups.remove_if(&user_id, |_, group| group.is_empty());
        if removed {
            debug!(%user_id, %connection_id, "connection unregistered");
        }
    }

    /// Send `message` to every open connection of `user_id`, returning how
    /// many accepted it. Connections whose receiver is gone are pruned.
    pub fn deliver(&self, user_id: Uuid, message: &str) -> usize {
        let mut delivered = 0;
        let now_empty = match self.groups.get_mut(&user_id) {
            Some(mut group) => {
                group.retain(|connection_id, tx| match tx.send(message.to_owned()) {
                    Ok(()) => {
                        delivered += 1;
                        true
                    }
                    Err(_) => {
                        warn!(%user_id, %connection_id, "dropping dead connection");
                        false
                    }
                });
                group.is_empty()
            }
            None => {
                debug!(%user_id, "no open connection, notification dropped");
                return 0;
            }
        };
        if now_empty {
            self.groups.remove_if(&user_id, |_, group| group.is_empty());
        }
        delivered
    }

    /// Number of open connections for `user_id`.
    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.groups.get(&user_id).map(|g| g.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for ConnectionRegistry {
    async fn publish(&self, user_id: Uuid, message: &str) {
        self.deliver(user_id, message);
    }
}

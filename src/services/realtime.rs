//! Per-user fan-out of real-time events over WebSocket connections.
//!
//! A user may hold several sockets at once (one per tab or device); each
//! socket registers an mpsc sender with the [`Hub`]. Delivery is best-effort:
//! full or closed channels are skipped and closed ones pruned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};

use crate::models::{
    message::{Message, MessageStatus},
    notification::Notification,
};

/// Outbound buffer per socket.
pub const CONNECTION_BUFFER: usize = 64;

/// Events pushed from the server to connected clients.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Notification { notification: Notification },
    Message { message: Message },
    MessageStatus {
        message_id: i64,
        status: MessageStatus,
    },
    Typing { from: i64 },
    Pong,
    Error { message: String },
}

/// Events accepted from clients.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Ping,
    Ack { message_id: i64 },
    Read { message_id: i64 },
    Typing { to: i64 },
}

/// Handle returned on registration; needed to unregister exactly this socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Default)]
pub struct Hub {
    next_id: AtomicU64,
    connections: RwLock<HashMap<i64, Vec<(ConnectionId, mpsc::Sender<ServerEvent>)>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: i64, sender: mpsc::Sender<ServerEvent>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((id, sender));
        tracing::debug!(user_id, connection = id.0, "socket registered");
        id
    }

    pub async fn unregister(&self, user_id: i64, connection: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(senders) = connections.get_mut(&user_id) {
            senders.retain(|(id, _)| *id != connection);
            if senders.is_empty() {
                connections.remove(&user_id);
            }
        }
        tracing::debug!(user_id, connection = connection.0, "socket unregistered");
    }

    pub async fn online_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Pushes an event to every live socket of `user_id`.
    /// Returns how many sockets accepted it.
    pub async fn send_to(&self, user_id: i64, event: ServerEvent) -> usize {
        let mut delivered = 0;
        let mut saw_closed = false;
        {
            let connections = self.connections.read().await;
            let Some(senders) = connections.get(&user_id) else {
                return 0;
            };
            for (_, tx) in senders {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(user_id, "socket buffer full, dropping event");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }

        if saw_closed {
            self.prune(user_id).await;
        }
        delivered
    }

    async fn prune(&self, user_id: i64) {
        let mut connections = self.connections.write().await;
        if let Some(senders) = connections.get_mut(&user_id) {
            senders.retain(|(_, tx)| !tx.is_closed());
            if senders.is_empty() {
                connections.remove(&user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_every_socket_of_a_user() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        hub.register(7, tx_a).await;
        hub.register(7, tx_b).await;

        assert_eq!(hub.send_to(7, ServerEvent::Pong).await, 2);
        assert_eq!(rx_a.recv().await, Some(ServerEvent::Pong));
        assert_eq!(rx_b.recv().await, Some(ServerEvent::Pong));
    }

    #[tokio::test]
    async fn offline_users_receive_nothing() {
        let hub = Hub::new();
        assert_eq!(hub.send_to(1, ServerEvent::Pong).await, 0);
        assert_eq!(hub.online_count().await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_only_that_socket() {
        let hub = Hub::new();
        let (tx_a, _rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let first = hub.register(3, tx_a).await;
        hub.register(3, tx_b).await;

        hub.unregister(3, first).await;
        assert_eq!(hub.send_to(3, ServerEvent::Pong).await, 1);
        assert_eq!(rx_b.recv().await, Some(ServerEvent::Pong));
    }

    #[tokio::test]
    async fn closed_channels_are_pruned() {
        let hub = Hub::new();
        let (tx, rx) = mpsc::channel(4);
        hub.register(9, tx).await;
        drop(rx);

        assert_eq!(hub.send_to(9, ServerEvent::Pong).await, 0);
        assert_eq!(hub.online_count().await, 0);
    }

    #[test]
    fn client_events_use_a_type_tag() {
        let event: ClientEvent = serde_json::from_str(r#"{"type":"ack","message_id":42}"#).unwrap();
        assert_eq!(event, ClientEvent::Ack { message_id: 42 });

        let json = serde_json::to_value(ServerEvent::MessageStatus {
            message_id: 5,
            status: MessageStatus::Read,
        })
        .unwrap();
        assert_eq!(json["type"], "message_status");
        assert_eq!(json["status"], "read");
    }
}

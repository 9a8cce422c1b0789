//! Session hub: maps session ids to the outbound queues of every
//! connection in that session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;

pub type ConnectionId = u64;

/// Thread-safe registry of live connections, grouped by session.
#[derive(Clone, Default)]
pub struct SessionHub {
    sessions: Arc<RwLock<HashMap<String, HashMap<ConnectionId, mpsc::Sender<String>>>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection's queue to a session, creating the session if needed.
    pub async fn register(&self, session_id: &str, tx: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .insert(id, tx);
        id
    }

    /// Remove a connection. Returns true if its session is now empty and
    /// was dropped.
    pub async fn unregister(&self, session_id: &str, id: ConnectionId) -> bool {
        let mut map = self.sessions.write().await;
        if let Some(connections) = map.get_mut(session_id) {
            connections.remove(&id);
            if connections.is_empty() {
                map.remove(session_id);
                return true;
            }
        }
        false
    }

    /// Queue `frame` for every connection in the session, the sender
    /// included. Connections whose queue is gone are removed. Returns how
    /// many connections accepted the frame.
    pub async fn broadcast(&self, session_id: &str, frame: &str) -> usize {
        let targets: Vec<(ConnectionId, mpsc::Sender<String>)> = {
            let map = self.sessions.read().await;
            match map.get(session_id) {
                Some(connections) => connections
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(frame.to_string()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(session = %session_id, connection = id, "Connection queue full; frame dropped");
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        for id in dead {
            tracing::debug!(session = %session_id, connection = id, "Removing dead connection");
            self.unregister(session_id, id).await;
        }
        delivered
    }

    pub async fn connection_count(&self, session_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, HashMap::len)
    }

    /// Number of sessions with at least one connection.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_connection_in_session() {
        let hub = SessionHub::new();
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        let (c_tx, mut c_rx) = mpsc::channel(8);
        hub.register("s1", a_tx).await;
        hub.register("s1", b_tx).await;
        hub.register("s2", c_tx).await;

        assert_eq!(hub.broadcast("s1", "hello").await, 2);
        assert_eq!(a_rx.recv().await.as_deref(), Some("hello"));
        assert_eq!(b_rx.recv().await.as_deref(), Some("hello"));
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_connections_are_pruned() {
        let hub = SessionHub::new();
        let (a_tx, _a_rx) = mpsc::channel(8);
        let (b_tx, b_rx) = mpsc::channel(8);
        hub.register("s1", a_tx).await;
        hub.register("s1", b_tx).await;
        drop(b_rx);

        assert_eq!(hub.broadcast("s1", "x").await, 1);
        assert_eq!(hub.connection_count("s1").await, 1);
    }

    #[tokio::test]
    async fn empty_sessions_are_dropped() {
        let hub = SessionHub::new();
        let (tx, _rx) = mpsc::channel(8);
        let id = hub.register("s1", tx).await;
        assert_eq!(hub.session_count().await, 1);

        assert!(hub.unregister("s1", id).await);
        assert_eq!(hub.session_count().await, 0);
        assert_eq!(hub.broadcast("s1", "x").await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_frame_but_keeps_connection() {
        let hub = SessionHub::new();
        let (tx, mut rx) = mpsc::channel(1);
        hub.register("s1", tx).await;

        assert_eq!(hub.broadcast("s1", "first").await, 1);
        assert_eq!(hub.broadcast("s1", "second").await, 0);
        assert_eq!(hub.connection_count("s1").await, 1);
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
    }
}

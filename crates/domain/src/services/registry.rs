//! Live connection registry.
//!
//! Maps each user id to the set of connections that authenticated as that
//! user. Every connection owns a bounded queue drained by its socket task;
//! pushes never wait on a slow client.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::realtime::ServerMessage;

pub type ConnectionId = Uuid;

/// Sending side of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

/// What happened to a single push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// Queue full; the message was dropped for this connection only.
    Dropped,
    /// The receiving task is gone.
    Closed,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver its socket task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an already-serialized frame without waiting.
    pub fn push_raw(&self, payload: String) -> PushOutcome {
        match self.tx.try_send(payload) {
            Ok(()) => PushOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => PushOutcome::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    pub fn push(&self, message: &ServerMessage) -> PushOutcome {
        match serde_json::to_string(message) {
            Ok(payload) => self.push_raw(payload),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize server message");
                PushOutcome::Dropped
            }
        }
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    users: RwLock<HashMap<i64, HashMap<ConnectionId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: i64, handle: ConnectionHandle) {
        let connection_id = handle.id();
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user_id)
            .or_default()
            .insert(connection_id, handle);
        tracing::debug!(user_id, %connection_id, "Connection registered");
    }

    /// Removes a connection wherever it is registered, dropping the user's
    /// entry once empty. Returns the user it belonged to.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<i64> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let user_id = users
            .iter()
            .find(|(_, connections)| connections.contains_key(&connection_id))
            .map(|(user_id, _)| *user_id)?;

        if let Some(connections) = users.get_mut(&user_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                users.remove(&user_id);
            }
        }
        tracing::debug!(user_id, %connection_id, "Connection unregistered");
        Some(user_id)
    }

    /// Pushes one copy to every connection of the user. Returns how many
    /// queues accepted it.
    pub fn send_to_user(&self, user_id: i64, message: &ServerMessage) -> usize {
        let Some(payload) = serialize(message) else {
            return 0;
        };

        let (delivered, closed) = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            match users.get(&user_id) {
                Some(connections) => fan_out(connections.values(), &payload),
                None => return 0,
            }
        };

        self.prune(closed);
        delivered
    }

    /// Pushes to every live connection of the listed users. Duplicate ids
    /// are sent to once.
    pub fn send_to_users(&self, user_ids: &[i64], message: &ServerMessage) -> usize {
        let Some(payload) = serialize(message) else {
            return 0;
        };

        let mut audience = user_ids.to_vec();
        audience.sort_unstable();
        audience.dedup();

        let (delivered, closed) = {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            fan_out(
                audience
                    .iter()
                    .filter_map(|user_id| users.get(user_id))
                    .flat_map(HashMap::values),
                &payload,
            )
        };

        self.prune(closed);
        delivered
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn user_count(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn prune(&self, closed: Vec<ConnectionId>) {
        for connection_id in closed {
            self.unregister(connection_id);
        }
    }
}

fn serialize(message: &ServerMessage) -> Option<String> {
    serde_json::to_string(message)
        .map_err(|e| tracing::error!(error = %e, "Failed to serialize server message"))
        .ok()
}

fn fan_out<'a>(
    connections: impl Iterator<Item = &'a ConnectionHandle>,
    payload: &str,
) -> (usize, Vec<ConnectionId>) {
    let mut delivered = 0;
    let mut closed = Vec::new();
    for handle in connections {
        match handle.push_raw(payload.to_owned()) {
            PushOutcome::Delivered => delivered += 1,
            PushOutcome::Dropped => {
                tracing::warn!(connection_id = %handle.id(), "Connection queue full, message dropped");
            }
            PushOutcome::Closed => closed.push(handle.id()),
        }
    }
    (delivered, closed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_frame(text: &str) -> ServerMessage {
        ServerMessage::Error {
            message: text.to_string(),
        }
    }

    #[test]
    fn test_one_copy_per_connection() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = ConnectionHandle::channel(8);
        let (b, mut rx_b) = ConnectionHandle::channel(8);
        registry.register(1, a);
        registry.register(1, b);

        assert_eq!(registry.send_to_user(1, &error_frame("hi")), 2);
        assert!(rx_a.try_recv().unwrap().contains("\"hi\""));
        assert!(rx_b.try_recv().unwrap().contains("\"hi\""));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_send_to_offline_user() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.send_to_user(42, &error_frame("x")), 0);
    }

    #[test]
    fn test_unregister_prunes_empty_user() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = ConnectionHandle::channel(8);
        let (b, _rx_b) = ConnectionHandle::channel(8);
        let (a_id, b_id) = (a.id(), b.id());
        registry.register(1, a);
        registry.register(1, b);

        assert_eq!(registry.unregister(a_id), Some(1));
        assert!(registry.is_connected(1));
        assert_eq!(registry.unregister(b_id), Some(1));
        assert!(!registry.is_connected(1));
        assert_eq!(registry.user_count(), 0);
        assert_eq!(registry.unregister(b_id), None);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx) = ConnectionHandle::channel(1);
        registry.register(1, a);

        assert_eq!(registry.send_to_user(1, &error_frame("first")), 1);
        assert_eq!(registry.send_to_user(1, &error_frame("second")), 0);
        assert!(rx.try_recv().unwrap().contains("first"));
        // Still registered after a drop.
        assert!(registry.is_connected(1));
    }

    #[test]
    fn test_closed_connection_pruned_on_push() {
        let registry = ConnectionRegistry::new();
        let (a, rx) = ConnectionHandle::channel(4);
        let (b, mut rx_b) = ConnectionHandle::channel(4);
        registry.register(1, a);
        registry.register(1, b);
        drop(rx);

        assert_eq!(registry.send_to_user(1, &error_frame("x")), 1);
        assert_eq!(registry.connection_count(), 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn test_send_to_users_skips_everyone_else() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = ConnectionHandle::channel(4);
        let (b, mut rx_b) = ConnectionHandle::channel(4);
        let (c, mut rx_c) = ConnectionHandle::channel(4);
        registry.register(1, a);
        registry.register(2, b);
        registry.register(3, c);

        assert_eq!(registry.send_to_users(&[1, 2, 1, 99], &error_frame("some")), 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_register_and_push() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(ConnectionRegistry::new());
        let mut receivers = Vec::new();
        let mut threads = Vec::new();
        for user_id in 0..8 {
            let (handle, rx) = ConnectionHandle::channel(64);
            receivers.push(rx);
            let registry = registry.clone();
            threads.push(thread::spawn(move || {
                registry.register(user_id, handle);
                for _ in 0..10 {
                    registry.send_to_user(user_id, &error_frame("tick"));
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(registry.connection_count(), 8);
        for mut rx in receivers {
            let mut count = 0;
            while rx.try_recv().is_ok() {
                count += 1;
            }
            assert_eq!(count, 10);
        }
    }
}

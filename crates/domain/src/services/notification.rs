//! Notification engine.
//!
//! Persists notifications and pushes them to the addressee's live
//! connections. Delivery is best effort: a user with no live connection, or
//! a connection whose queue is full, picks the row up from the unread list.

use std::sync::Arc;

use thiserror::Error;

use crate::models::complaint::Complaint;
use crate::models::notification::{Notification, NotificationDraft};
use crate::models::realtime::{ComplaintAction, ServerMessage};
use crate::services::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, PushOutcome};
use crate::store::{NotificationStore, StoreError};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct NotificationEngine {
    store: Arc<dyn NotificationStore>,
    registry: Arc<ConnectionRegistry>,
}

impl NotificationEngine {
    pub fn new(store: Arc<dyn NotificationStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Stores the notification unread, then pushes it to every live
    /// connection of the user.
    pub async fn enqueue(
        &self,
        user_id: i64,
        draft: NotificationDraft,
    ) -> Result<Notification, NotificationError> {
        let notification = self.store.create(draft.addressed_to(user_id)).await?;
        metrics::counter!("notifications_created_total").increment(1);

        let pushed = self.registry.send_to_user(
            user_id,
            &ServerMessage::NewNotification {
                data: notification.clone(),
            },
        );
        if pushed > 0 {
            metrics::counter!("notifications_pushed_total").increment(pushed as u64);
        }
        tracing::debug!(
            user_id,
            notification_id = notification.id,
            pushed,
            "Notification enqueued"
        );

        Ok(notification)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.store.list(user_id).await?)
    }

    pub async fn unread(&self, user_id: i64) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.store.unread(user_id).await?)
    }

    /// Idempotent. Unknown ids and other users' notifications are `NotFound`.
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<(), NotificationError> {
        if self.store.mark_read(id, user_id).await? {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }

    /// Idempotent; returns how many notifications changed.
    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        Ok(self.store.mark_all_read(user_id).await?)
    }

    /// Registers an authenticated connection and sends it the unread
    /// catch-up burst. Returns the number of unread notifications sent.
    pub async fn connect(
        &self,
        user_id: i64,
        handle: ConnectionHandle,
    ) -> Result<usize, NotificationError> {
        self.registry.register(user_id, handle.clone());

        let unread = self.store.unread(user_id).await?;
        let count = unread.len();
        if handle.push(&ServerMessage::Notifications { data: unread }) != PushOutcome::Delivered {
            tracing::warn!(user_id, connection_id = %handle.id(), "Catch-up burst not delivered");
        }
        Ok(count)
    }

    pub fn disconnect(&self, connection_id: ConnectionId) -> Option<i64> {
        self.registry.unregister(connection_id)
    }

    /// Best-effort push of a complaint change to the live connections of
    /// `audience`. Callers decide who may see the complaint.
    pub fn publish_complaint(
        &self,
        action: ComplaintAction,
        complaint: &Complaint,
        audience: &[i64],
    ) -> usize {
        self.registry.send_to_users(
            audience,
            &ServerMessage::ComplaintUpdate {
                action,
                data: complaint.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::notification::NotificationKind;

    fn engine() -> (NotificationEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let engine = NotificationEngine::new(store.clone(), Arc::new(ConnectionRegistry::new()));
        (engine, store)
    }

    fn draft(title: &str) -> NotificationDraft {
        NotificationDraft {
            complaint_id: None,
            title: title.to_string(),
            message: "body".to_string(),
            kind: NotificationKind::StatusUpdate,
        }
    }

    #[tokio::test]
    async fn test_enqueue_pushes_one_copy_per_connection() {
        let (engine, _) = engine();
        let (a, mut rx_a) = ConnectionHandle::channel(8);
        let (b, mut rx_b) = ConnectionHandle::channel(8);
        engine.registry().register(5, a);
        engine.registry().register(5, b);

        let n = engine.enqueue(5, draft("hello")).await.unwrap();
        assert!(!n.is_read);

        for rx in [&mut rx_a, &mut rx_b] {
            let frame: serde_json::Value =
                serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(frame["type"], "new_notification");
            assert_eq!(frame["data"]["id"], n.id);
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_offline_user_sees_unread() {
        let (engine, _) = engine();
        let n = engine.enqueue(9, draft("offline")).await.unwrap();
        let unread = engine.unread(9).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, n.id);
    }

    #[tokio::test]
    async fn test_connect_sends_catch_up_burst() {
        let (engine, _) = engine();
        engine.enqueue(3, draft("one")).await.unwrap();
        engine.enqueue(3, draft("two")).await.unwrap();

        let (handle, mut rx) = ConnectionHandle::channel(8);
        assert_eq!(engine.connect(3, handle).await.unwrap(), 2);

        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "notifications");
        assert_eq!(frame["data"].as_array().unwrap().len(), 2);
        assert!(engine.registry().is_connected(3));
    }

    #[tokio::test]
    async fn test_mark_read_unknown_is_not_found() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.mark_read(999, 1).await,
            Err(NotificationError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_mark_read_other_users_notification() {
        let (engine, _) = engine();
        let n = engine.enqueue(1, draft("mine")).await.unwrap();
        assert!(matches!(
            engine.mark_read(n.id, 2).await,
            Err(NotificationError::NotFound)
        ));
        engine.mark_read(n.id, 1).await.unwrap();
        engine.mark_read(n.id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_all_read_is_idempotent() {
        let (engine, _) = engine();
        engine.enqueue(4, draft("a")).await.unwrap();
        engine.enqueue(4, draft("b")).await.unwrap();

        assert_eq!(engine.mark_all_read(4).await.unwrap(), 2);
        assert_eq!(engine.mark_all_read(4).await.unwrap(), 0);
        assert!(engine.unread(4).await.unwrap().is_empty());
        assert_eq!(engine.list(4).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (engine, store) = engine();
        store.fail_notification_writes(true);
        assert!(matches!(
            engine.enqueue(1, draft("x")).await,
            Err(NotificationError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_unregisters() {
        let (engine, _) = engine();
        let (handle, _rx) = ConnectionHandle::channel(8);
        let id = handle.id();
        engine.connect(7, handle).await.unwrap();
        assert_eq!(engine.disconnect(id), Some(7));
        assert!(!engine.registry().is_connected(7));
    }
}

//! Complaint lifecycle controller.
//!
//! The only path that creates complaints or changes their status. Each
//! status change commits together with its history row, then produces exactly
//! one notification attempt for the complaint owner.

use std::sync::Arc;

use thiserror::Error;

use super::clock::Clock;
use super::notification::NotificationEngine;
use crate::models::comment::{CommentRequest, ComplaintComment, NewComment};
use crate::models::complaint::{
    Complaint, ComplaintDraft, ComplaintFilter, ComplaintPatch, ComplaintStats, ComplaintStatus,
    FieldError, CREATION_ACTOR,
};
use crate::models::history::ComplaintHistory;
use crate::models::notification::NotificationDraft;
use crate::models::realtime::ComplaintAction;
use crate::models::user::UserRole;
use crate::store::{CommentStore, ComplaintStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Complaint not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    /// Serial allocation collided; the caller may resubmit.
    #[error("Complaint number conflict, please retry")]
    RetryableConflict,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        LifecycleError::Store(err)
    }
}

impl From<FieldError> for LifecycleError {
    fn from(err: FieldError) -> Self {
        LifecycleError::Validation(err.to_string())
    }
}

/// Authenticated caller of a lifecycle operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
}

impl Actor {
    fn can_see(&self, complaint: &Complaint) -> bool {
        self.role.is_admin() || complaint.user_id == self.user_id
    }
}

#[derive(Clone)]
pub struct ComplaintLifecycle {
    complaints: Arc<dyn ComplaintStore>,
    users: Arc<dyn UserStore>,
    comments: Arc<dyn CommentStore>,
    notifications: NotificationEngine,
    clock: Arc<dyn Clock>,
}

impl ComplaintLifecycle {
    pub fn new(
        complaints: Arc<dyn ComplaintStore>,
        users: Arc<dyn UserStore>,
        comments: Arc<dyn CommentStore>,
        notifications: NotificationEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            complaints,
            users,
            comments,
            notifications,
            clock,
        }
    }

    /// Validates and stores a new complaint with status `new` and its
    /// creation history row. Submissions by asm users notify every admin.
    pub async fn create(
        &self,
        owner: &Actor,
        draft: ComplaintDraft,
    ) -> Result<Complaint, LifecycleError> {
        let today = self.clock.now().date_naive();
        let new = draft.into_new(owner.user_id, today)?;

        let complaint = self
            .complaints
            .create(new, CREATION_ACTOR)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(detail) => {
                    tracing::warn!(user_id = owner.user_id, %detail, "Complaint serial conflict");
                    LifecycleError::RetryableConflict
                }
                other => LifecycleError::Store(other),
            })?;

        metrics::counter!("complaints_created_total").increment(1);
        tracing::info!(
            complaint_id = complaint.id,
            code = %complaint.complaint_code,
            user_id = owner.user_id,
            "Complaint created"
        );

        let admins = self.admin_ids(complaint.id).await;
        if owner.role == UserRole::Asm {
            self.notify_admins(&complaint, &owner.username, &admins).await;
        }
        self.publish(ComplaintAction::Created, &complaint, admins);

        Ok(complaint)
    }

    /// Moves a complaint to any status, records history and notifies the owner.
    pub async fn transition_status(
        &self,
        id: i64,
        status: ComplaintStatus,
        actor: &str,
    ) -> Result<Complaint, LifecycleError> {
        let transition = self
            .complaints
            .transition(id, status, actor)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        let complaint = transition.complaint;

        metrics::counter!(
            "complaint_transitions_total",
            "to" => status.as_str()
        )
        .increment(1);
        tracing::info!(
            complaint_id = id,
            code = %complaint.complaint_code,
            from = %transition.previous_status,
            to = %status,
            actor,
            "Complaint status changed"
        );

        // The transition is committed; a failed notification is reported, not rolled back.
        let draft =
            NotificationDraft::status_changed(&complaint, transition.previous_status, status);
        if let Err(e) = self.notifications.enqueue(complaint.user_id, draft).await {
            tracing::error!(
                complaint_id = id,
                user_id = complaint.user_id,
                error = %e,
                "Status change notification failed"
            );
        }
        let admins = self.admin_ids(id).await;
        self.publish(ComplaintAction::StatusChanged, &complaint, admins);

        Ok(complaint)
    }

    /// Partial update of non-status fields. Writes no history and sends no
    /// notification.
    pub async fn update_fields(
        &self,
        id: i64,
        patch: &ComplaintPatch,
    ) -> Result<Complaint, LifecycleError> {
        patch.check()?;
        let complaint = self
            .complaints
            .update_fields(id, patch)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        tracing::info!(complaint_id = id, "Complaint fields updated");
        let admins = self.admin_ids(id).await;
        self.publish(ComplaintAction::Updated, &complaint, admins);
        Ok(complaint)
    }

    /// Fetches a complaint the actor may see. Asm users only see their own;
    /// anything else is reported as missing.
    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Complaint, LifecycleError> {
        match self.complaints.find(id).await? {
            Some(complaint) if actor.can_see(&complaint) => Ok(complaint),
            _ => Err(LifecycleError::NotFound),
        }
    }

    /// Lists complaints; asm users are restricted to their own.
    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: ComplaintFilter,
    ) -> Result<Vec<Complaint>, LifecycleError> {
        filter.owner_id = match actor.role {
            UserRole::Admin => None,
            UserRole::Asm => Some(actor.user_id),
        };
        Ok(self.complaints.list(&filter).await?)
    }

    pub async fn history(
        &self,
        actor: &Actor,
        id: i64,
    ) -> Result<Vec<ComplaintHistory>, LifecycleError> {
        self.get(actor, id).await?;
        Ok(self.complaints.history(id).await?)
    }

    /// Status counts, across all complaints or for one owner.
    pub async fn stats(&self, owner_id: Option<i64>) -> Result<ComplaintStats, LifecycleError> {
        let today = self.clock.now().date_naive();
        Ok(self.complaints.stats(owner_id, today).await?)
    }

    pub async fn comments(
        &self,
        actor: &Actor,
        id: i64,
    ) -> Result<Vec<ComplaintComment>, LifecycleError> {
        self.get(actor, id).await?;
        Ok(self.comments.list(id).await?)
    }

    /// Adds a comment. Asm users cannot comment on closed complaints.
    pub async fn add_comment(
        &self,
        actor: &Actor,
        id: i64,
        request: CommentRequest,
    ) -> Result<ComplaintComment, LifecycleError> {
        let complaint = self.get(actor, id).await?;
        if actor.role == UserRole::Asm && complaint.status == ComplaintStatus::Closed {
            return Err(LifecycleError::Forbidden(
                "Cannot comment on a closed complaint".to_string(),
            ));
        }

        let comment = self
            .comments
            .add(NewComment {
                complaint_id: id,
                user_id: actor.user_id,
                user_role: actor.role,
                message: request.message.trim().to_string(),
                parent_comment_id: request.parent_comment_id,
            })
            .await?;
        tracing::debug!(complaint_id = id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }

    /// Ids of every admin. A failed lookup is logged and yields none, so
    /// live updates still reach the owner.
    async fn admin_ids(&self, complaint_id: i64) -> Vec<i64> {
        match self.users.list_by_role(UserRole::Admin).await {
            Ok(admins) => admins.into_iter().map(|admin| admin.id).collect(),
            Err(e) => {
                tracing::error!(complaint_id, error = %e, "Failed to load admins");
                Vec::new()
            }
        }
    }

    async fn notify_admins(&self, complaint: &Complaint, submitted_by: &str, admins: &[i64]) {
        for &admin_id in admins {
            let draft = NotificationDraft::complaint_received(complaint, submitted_by);
            if let Err(e) = self.notifications.enqueue(admin_id, draft).await {
                tracing::error!(
                    complaint_id = complaint.id,
                    user_id = admin_id,
                    error = %e,
                    "Admin notification failed"
                );
            }
        }
    }

    /// Live `complaint_update` frames go to the owner and admins only, the
    /// same audience that can read the complaint over HTTP.
    fn publish(&self, action: ComplaintAction, complaint: &Complaint, mut audience: Vec<i64>) {
        audience.push(complaint.user_id);
        self.notifications
            .publish_complaint(action, complaint, &audience);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::complaint::{ComplaintFields, Priority, PLACEHOLDER};
    use crate::models::notification::NotificationKind;
    use crate::models::user::NewUser;
    use crate::services::clock::ManualClock;
    use crate::services::registry::{ConnectionHandle, ConnectionRegistry};
    use crate::store::NotificationStore;
    use chrono::{TimeZone, Utc};

    struct Harness {
        lifecycle: ComplaintLifecycle,
        engine: NotificationEngine,
        store: Arc<InMemoryStore>,
        asm: Actor,
        admin: Actor,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
        ));
        let engine = NotificationEngine::new(store.clone(), Arc::new(ConnectionRegistry::new()));
        let lifecycle = ComplaintLifecycle::new(
            store.clone(),
            store.clone(),
            store.clone(),
            engine.clone(),
            clock,
        );

        let asm_user = UserStore::create(&*store, new_user("asm.north", UserRole::Asm))
            .await
            .unwrap();
        let admin_user = UserStore::create(&*store, new_user("root", UserRole::Admin))
            .await
            .unwrap();

        Harness {
            lifecycle,
            engine,
            store,
            asm: Actor {
                user_id: asm_user.id,
                username: asm_user.username,
                role: UserRole::Asm,
            },
            admin: Actor {
                user_id: admin_user.id,
                username: admin_user.username,
                role: UserRole::Admin,
            },
        }
    }

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{}@example.com", username),
            password_hash: "hash".into(),
            role,
            first_name: None,
            last_name: None,
            phone: None,
        }
    }

    fn draft() -> ComplaintDraft {
        ComplaintDraft {
            fields: ComplaintFields {
                complaint_source: Some("Distributor".into()),
                depo_party_name: Some("Acme Traders".into()),
                complaint_type: Some("Short supply".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();

        assert_eq!(complaint.status, ComplaintStatus::New);
        assert_eq!(complaint.priority, Priority::Medium);
        assert_eq!(complaint.complaint_code, "250301");
        assert_eq!(complaint.complaint_code.len(), 6);
        assert_eq!(complaint.details.voc, PLACEHOLDER);

        let history = h.lifecycle.history(&h.asm, complaint.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_status, None);
        assert_eq!(history[0].new_status, ComplaintStatus::New);
        assert_eq!(history[0].changed_by, "Customer");
    }

    #[tokio::test]
    async fn test_create_numbers_sequentially() {
        let h = harness().await;
        let first = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        let second = h.lifecycle.create(&h.admin, draft()).await.unwrap();
        assert_eq!(first.complaint_code, "250301");
        assert_eq!(second.complaint_code, "250302");
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required() {
        let h = harness().await;
        let mut bad = draft();
        bad.fields.complaint_source = None;
        let err = h.lifecycle.create(&h.asm, bad).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(msg) if msg.contains("complaintSource")));
    }

    #[tokio::test]
    async fn test_create_surfaces_retryable_conflict() {
        let h = harness().await;
        h.store.inject_sequence_conflicts(1);
        let err = h.lifecycle.create(&h.asm, draft()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::RetryableConflict));
        // The controller does not retry on its own; a resubmission succeeds.
        assert!(h.lifecycle.create(&h.asm, draft()).await.is_ok());
    }

    #[tokio::test]
    async fn test_asm_submission_notifies_admins() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();

        let admin_unread = h.engine.unread(h.admin.user_id).await.unwrap();
        assert_eq!(admin_unread.len(), 1);
        assert_eq!(admin_unread[0].title, "New Complaint Received");
        assert_eq!(admin_unread[0].kind, NotificationKind::NewComplaint);
        assert_eq!(admin_unread[0].complaint_id, Some(complaint.id));

        h.lifecycle.create(&h.admin, draft()).await.unwrap();
        assert_eq!(h.engine.unread(h.admin.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transition_writes_history_and_one_notification() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();

        let updated = h
            .lifecycle
            .transition_status(complaint.id, ComplaintStatus::Resolved, "AgentX")
            .await
            .unwrap();
        assert_eq!(updated.status, ComplaintStatus::Resolved);

        let history = h.lifecycle.history(&h.admin, complaint.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].previous_status, Some(ComplaintStatus::New));
        assert_eq!(history[1].new_status, ComplaintStatus::Resolved);
        assert_eq!(history[1].changed_by, "AgentX");

        let owner_notifications = NotificationStore::list(&*h.store, h.asm.user_id).await.unwrap();
        assert_eq!(owner_notifications.len(), 1);
        assert_eq!(owner_notifications[0].title, "Complaint Status Updated");
        assert_eq!(
            owner_notifications[0].message,
            "Your complaint #250301 status changed from new to resolved"
        );
    }

    #[tokio::test]
    async fn test_any_state_reaches_any_state() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();

        let path = [
            ComplaintStatus::Closed,
            ComplaintStatus::InProgress,
            ComplaintStatus::New,
            ComplaintStatus::Resolved,
            ComplaintStatus::Resolved,
            ComplaintStatus::Closed,
        ];
        for status in path {
            h.lifecycle
                .transition_status(complaint.id, status, "admin")
                .await
                .unwrap();
        }

        let current = h.lifecycle.get(&h.admin, complaint.id).await.unwrap();
        assert_eq!(current.status, ComplaintStatus::Closed);

        let history = h.lifecycle.history(&h.admin, complaint.id).await.unwrap();
        assert_eq!(history.len(), path.len() + 1);
        // Each row's previous status is the prior row's new status.
        for pair in history.windows(2) {
            assert_eq!(pair[1].previous_status, Some(pair[0].new_status));
        }
        assert_eq!(
            NotificationStore::list(&*h.store, h.asm.user_id).await.unwrap().len(),
            path.len()
        );
    }

    #[tokio::test]
    async fn test_transition_unknown_complaint() {
        let h = harness().await;
        let err = h
            .lifecycle
            .transition_status(404, ComplaintStatus::Closed, "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound));
    }

    #[tokio::test]
    async fn test_transition_survives_notification_failure() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        h.store.fail_notification_writes(true);

        let updated = h
            .lifecycle
            .transition_status(complaint.id, ComplaintStatus::InProgress, "admin")
            .await
            .unwrap();
        assert_eq!(updated.status, ComplaintStatus::InProgress);
        assert_eq!(
            h.lifecycle.history(&h.admin, complaint.id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_transition_pushes_to_live_owner() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        let (handle, mut rx) = ConnectionHandle::channel(16);
        h.engine.connect(h.asm.user_id, handle).await.unwrap();
        let _catch_up = rx.try_recv().unwrap();

        h.lifecycle
            .transition_status(complaint.id, ComplaintStatus::InProgress, "admin")
            .await
            .unwrap();

        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "new_notification");
        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "complaint_update");
        assert_eq!(frame["action"], "status_changed");
        assert_eq!(frame["data"]["status"], "in-progress");
    }

    #[tokio::test]
    async fn test_complaint_updates_reach_owner_and_admins_only() {
        let h = harness().await;
        let bystander = UserStore::create(&*h.store, new_user("asm.south", UserRole::Asm))
            .await
            .unwrap();

        let (owner_conn, mut owner_rx) = ConnectionHandle::channel(16);
        let (admin_conn, mut admin_rx) = ConnectionHandle::channel(16);
        let (other_conn, mut other_rx) = ConnectionHandle::channel(16);
        h.engine.registry().register(h.asm.user_id, owner_conn);
        h.engine.registry().register(h.admin.user_id, admin_conn);
        h.engine.registry().register(bystander.id, other_conn);

        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        h.lifecycle
            .update_fields(complaint.id, &ComplaintPatch::default())
            .await
            .unwrap();

        let frames = |rx: &mut tokio::sync::mpsc::Receiver<String>| {
            let mut updates = Vec::new();
            while let Ok(raw) = rx.try_recv() {
                let frame: serde_json::Value = serde_json::from_str(&raw).unwrap();
                if frame["type"] == "complaint_update" {
                    updates.push(frame["action"].as_str().unwrap().to_string());
                }
            }
            updates
        };

        assert_eq!(frames(&mut owner_rx), ["created", "updated"]);
        assert_eq!(frames(&mut admin_rx), ["created", "updated"]);
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_fields_leaves_status_and_history() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        let patch = ComplaintPatch {
            fields: ComplaintFields {
                action_taken: Some("Credit note raised".into()),
                final_status: Some("closed".into()),
                ..Default::default()
            },
            priority: Some(Priority::High),
            ..Default::default()
        };

        let updated = h.lifecycle.update_fields(complaint.id, &patch).await.unwrap();
        assert_eq!(updated.status, ComplaintStatus::New);
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.details.final_status, "closed");
        assert_eq!(
            h.lifecycle.history(&h.admin, complaint.id).await.unwrap().len(),
            1
        );
        assert!(NotificationStore::list(&*h.store, h.asm.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_fields_rejects_blank_required() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        let patch = ComplaintPatch {
            fields: ComplaintFields {
                complaint_type: Some(" ".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            h.lifecycle.update_fields(complaint.id, &patch).await,
            Err(LifecycleError::Validation(_))
        ));
        assert!(matches!(
            h.lifecycle.update_fields(999, &ComplaintPatch::default()).await,
            Err(LifecycleError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_asm_scoping() {
        let h = harness().await;
        let other = Actor {
            user_id: 777,
            username: "asm.south".into(),
            role: UserRole::Asm,
        };
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();

        assert!(matches!(
            h.lifecycle.get(&other, complaint.id).await,
            Err(LifecycleError::NotFound)
        ));
        assert!(h
            .lifecycle
            .list(&other, ComplaintFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            h.lifecycle
                .list(&h.admin, ComplaintFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_stats() {
        let h = harness().await;
        let a = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        h.lifecycle.create(&h.admin, draft()).await.unwrap();
        h.lifecycle
            .transition_status(a.id, ComplaintStatus::Closed, "admin")
            .await
            .unwrap();

        let all = h.lifecycle.stats(None).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.new, 1);
        assert_eq!(all.closed, 1);

        let mine = h.lifecycle.stats(Some(h.asm.user_id)).await.unwrap();
        assert_eq!(mine.total, 1);
        assert_eq!(mine.closed, 1);
    }

    #[tokio::test]
    async fn test_comments_blocked_on_closed_for_asm() {
        let h = harness().await;
        let complaint = h.lifecycle.create(&h.asm, draft()).await.unwrap();
        let request = |text: &str| CommentRequest {
            message: text.to_string(),
            parent_comment_id: None,
        };

        h.lifecycle
            .add_comment(&h.asm, complaint.id, request("Any update?"))
            .await
            .unwrap();
        h.lifecycle
            .transition_status(complaint.id, ComplaintStatus::Closed, "admin")
            .await
            .unwrap();

        assert!(matches!(
            h.lifecycle
                .add_comment(&h.asm, complaint.id, request("Reopen please"))
                .await,
            Err(LifecycleError::Forbidden(_))
        ));
        h.lifecycle
            .add_comment(&h.admin, complaint.id, request("Closed after credit note"))
            .await
            .unwrap();

        let comments = h.lifecycle.comments(&h.asm, complaint.id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].user_role, UserRole::Admin);
    }
}

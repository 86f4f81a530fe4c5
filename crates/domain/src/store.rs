//! Storage traits.
//!
//! Services depend on these traits; the persistence crate implements them on
//! Postgres and [`crate::memory::InMemoryStore`] implements them in memory.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::comment::{ComplaintComment, NewComment};
use crate::models::complaint::{
    Complaint, ComplaintFilter, ComplaintPatch, ComplaintStats, ComplaintStatus, NewComplaint,
};
use crate::models::history::{ComplaintHistory, Transition};
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::{NewUser, ProfileUpdate, SecurityKey, User, UserRole};

/// Storage failure with a stable kind.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Case-insensitive.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>, StoreError>;
    /// Fails with [`StoreError::Conflict`] on a duplicate username or email.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Returns false when no user has that id.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError>;
    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait SecurityKeyStore: Send + Sync {
    async fn active_keys(&self) -> Result<Vec<SecurityKey>, StoreError>;
    async fn create(&self, name: &str, key_hash: &str) -> Result<SecurityKey, StoreError>;
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Assigns the next serial for `complaint.period`, stores the complaint
    /// with status `new` and writes its creation history row, atomically.
    ///
    /// A serial collision surfaces as [`StoreError::Conflict`].
    async fn create(&self, complaint: NewComplaint, actor: &str)
        -> Result<Complaint, StoreError>;

    async fn find(&self, id: i64) -> Result<Option<Complaint>, StoreError>;

    /// Newest first.
    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError>;

    /// Applies a checked patch. Returns `None` for an unknown id.
    async fn update_fields(
        &self,
        id: i64,
        patch: &ComplaintPatch,
    ) -> Result<Option<Complaint>, StoreError>;

    /// Sets the status and appends one history row in a single atomic step.
    /// The previous status is read under the same lock as the write.
    /// Returns `None` for an unknown id.
    async fn transition(
        &self,
        id: i64,
        status: ComplaintStatus,
        actor: &str,
    ) -> Result<Option<Transition>, StoreError>;

    /// Oldest first.
    async fn history(&self, complaint_id: i64) -> Result<Vec<ComplaintHistory>, StoreError>;

    async fn stats(
        &self,
        owner_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<ComplaintStats, StoreError>;

    /// Health probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn add(&self, comment: NewComment) -> Result<ComplaintComment, StoreError>;
    /// Oldest first.
    async fn list(&self, complaint_id: i64) -> Result<Vec<ComplaintComment>, StoreError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores the notification unread.
    async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError>;
    /// Newest first.
    async fn list(&self, user_id: i64) -> Result<Vec<Notification>, StoreError>;
    /// Newest first.
    async fn unread(&self, user_id: i64) -> Result<Vec<Notification>, StoreError>;
    /// Returns false when the notification does not exist or belongs to
    /// another user. Marking an already-read notification succeeds.
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool, StoreError>;
    /// Returns how many notifications changed.
    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError>;
}

/// The full set of stores the application runs on.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub security_keys: Arc<dyn SecurityKeyStore>,
    pub complaints: Arc<dyn ComplaintStore>,
    pub comments: Arc<dyn CommentStore>,
    pub notifications: Arc<dyn NotificationStore>,
}

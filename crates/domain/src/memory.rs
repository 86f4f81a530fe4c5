//! In-memory implementation of every store trait.
//!
//! Backs the unit and HTTP integration tests without a database. State sits
//! behind one `std::sync::Mutex`; no method awaits while holding it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::models::comment::{ComplaintComment, NewComment};
use crate::models::complaint::{
    format_code, Complaint, ComplaintFilter, ComplaintPatch, ComplaintStats, ComplaintStatus,
    NewComplaint,
};
use crate::models::history::{ComplaintHistory, Transition};
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::{NewUser, ProfileUpdate, SecurityKey, User, UserRole};
use crate::store::{
    CommentStore, ComplaintStore, NotificationStore, SecurityKeyStore, StoreError, Stores,
    UserStore,
};

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<User>,
    security_keys: Vec<SecurityKey>,
    complaints: Vec<Complaint>,
    sequences: HashMap<String, i32>,
    history: Vec<ComplaintHistory>,
    comments: Vec<ComplaintComment>,
    notifications: Vec<Notification>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Ids are shared across all tables and start at 1.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_password_writes: AtomicBool,
    fail_notification_writes: AtomicBool,
    pending_conflicts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps one shared instance in every store slot.
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            users: self.clone(),
            security_keys: self.clone(),
            complaints: self.clone(),
            comments: self.clone(),
            notifications: self.clone(),
        }
    }

    /// Makes password writes fail with a backend error.
    pub fn fail_password_writes(&self, fail: bool) {
        self.fail_password_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes notification inserts fail with a backend error.
    pub fn fail_notification_writes(&self, fail: bool) {
        self.fail_notification_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` complaint creations fail with a serial conflict.
    pub fn inject_sequence_conflicts(&self, count: usize) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.trim();
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.lock();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("username already exists".into()));
        }
        if state
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::Conflict("email already exists".into()));
        }
        let now = Utc::now();
        let user = User {
            id: state.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError> {
        if self.fail_password_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("password write failed".into()));
        }
        let mut state = self.lock();
        match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let mut state = self.lock();
        if let Some(email) = &update.email {
            if state
                .users
                .iter()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(StoreError::Conflict("email already exists".into()));
            }
        }
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(first_name) = &update.first_name {
            user.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &update.last_name {
            user.last_name = Some(last_name.clone());
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl SecurityKeyStore for InMemoryStore {
    async fn active_keys(&self) -> Result<Vec<SecurityKey>, StoreError> {
        Ok(self
            .lock()
            .security_keys
            .iter()
            .filter(|k| k.is_active)
            .cloned()
            .collect())
    }

    async fn create(&self, name: &str, key_hash: &str) -> Result<SecurityKey, StoreError> {
        let mut state = self.lock();
        if state.security_keys.iter().any(|k| k.name == name) {
            return Err(StoreError::Conflict("security key name already exists".into()));
        }
        let key = SecurityKey {
            id: state.next_id(),
            name: name.to_string(),
            key_hash: key_hash.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        state.security_keys.push(key.clone());
        Ok(key)
    }
}

#[async_trait]
impl ComplaintStore for InMemoryStore {
    async fn create(
        &self,
        complaint: NewComplaint,
        actor: &str,
    ) -> Result<Complaint, StoreError> {
        let mut state = self.lock();
        let serial = {
            let counter = state.sequences.entry(complaint.period.clone()).or_insert(0);
            *counter += 1;
            *counter
        };
        // The serial stays spent, as it does when a database insert collides.
        if self.take_conflict() {
            return Err(StoreError::Conflict("complaint code already exists".into()));
        }
        let now = Utc::now();
        let stored = Complaint {
            id: state.next_id(),
            complaint_code: format_code(&complaint.period, serial),
            sequence_number: serial,
            user_id: complaint.user_id,
            status: ComplaintStatus::New,
            priority: complaint.priority,
            date: complaint.date,
            details: complaint.details,
            created_at: now,
            updated_at: now,
        };
        let history = ComplaintHistory {
            id: state.next_id(),
            complaint_id: stored.id,
            previous_status: None,
            new_status: ComplaintStatus::New,
            changed_by: actor.to_string(),
            changed_at: now,
        };
        state.complaints.push(stored.clone());
        state.history.push(history);
        Ok(stored)
    }

    async fn find(&self, id: i64) -> Result<Option<Complaint>, StoreError> {
        Ok(self.lock().complaints.iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError> {
        let mut complaints: Vec<Complaint> = self
            .lock()
            .complaints
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        complaints.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(complaints)
    }

    async fn update_fields(
        &self,
        id: i64,
        patch: &ComplaintPatch,
    ) -> Result<Option<Complaint>, StoreError> {
        let mut state = self.lock();
        let Some(complaint) = state.complaints.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        complaint.apply_patch(patch, Utc::now());
        Ok(Some(complaint.clone()))
    }

    async fn transition(
        &self,
        id: i64,
        status: ComplaintStatus,
        actor: &str,
    ) -> Result<Option<Transition>, StoreError> {
        let mut state = self.lock();
        let history_id = state.next_id();
        let now = Utc::now();
        let Some(complaint) = state.complaints.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        let previous_status = complaint.status;
        complaint.status = status;
        complaint.updated_at = now;
        let complaint = complaint.clone();

        let history = ComplaintHistory {
            id: history_id,
            complaint_id: id,
            previous_status: Some(previous_status),
            new_status: status,
            changed_by: actor.to_string(),
            changed_at: now,
        };
        state.history.push(history.clone());

        Ok(Some(Transition {
            complaint,
            previous_status,
            history,
        }))
    }

    async fn history(&self, complaint_id: i64) -> Result<Vec<ComplaintHistory>, StoreError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|h| h.complaint_id == complaint_id)
            .cloned()
            .collect())
    }

    async fn stats(
        &self,
        owner_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<ComplaintStats, StoreError> {
        let mut stats = ComplaintStats::default();
        for complaint in self
            .lock()
            .complaints
            .iter()
            .filter(|c| owner_id.map_or(true, |owner| c.user_id == owner))
        {
            stats.record(complaint, today);
        }
        Ok(stats)
    }
}

#[async_trait]
impl CommentStore for InMemoryStore {
    async fn add(&self, comment: NewComment) -> Result<ComplaintComment, StoreError> {
        let mut state = self.lock();
        let comment = ComplaintComment {
            id: state.next_id(),
            complaint_id: comment.complaint_id,
            user_id: comment.user_id,
            user_role: comment.user_role,
            message: comment.message,
            parent_comment_id: comment.parent_comment_id,
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list(&self, complaint_id: i64) -> Result<Vec<ComplaintComment>, StoreError> {
        Ok(self
            .lock()
            .comments
            .iter()
            .filter(|c| c.complaint_id == complaint_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        if self.fail_notification_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("notification write failed".into()));
        }
        let mut state = self.lock();
        let notification = Notification {
            id: state.next_id(),
            user_id: notification.user_id,
            complaint_id: notification.complaint_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            is_read: false,
            created_at: Utc::now(),
        };
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list(&self, user_id: i64) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn unread(&self, user_id: i64) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool, StoreError> {
        let mut state = self.lock();
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut changed = 0;
        for notification in self
            .lock()
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

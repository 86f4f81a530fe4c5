//! Notification domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::complaint::{Complaint, ComplaintStatus, InvalidValue};

/// Kind of event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewComplaint,
    StatusUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewComplaint => "new_complaint",
            NotificationKind::StatusUpdate => "status_update",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_complaint" => Ok(NotificationKind::NewComplaint),
            "status_update" => Ok(NotificationKind::StatusUpdate),
            other => Err(InvalidValue {
                kind: "notification kind",
                value: other.to_string(),
            }),
        }
    }
}

/// A stored notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub complaint_id: Option<i64>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification content before it is addressed and stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub complaint_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl NotificationDraft {
    /// Sent to the owner when a complaint changes status.
    pub fn status_changed(
        complaint: &Complaint,
        previous: ComplaintStatus,
        current: ComplaintStatus,
    ) -> Self {
        Self {
            complaint_id: Some(complaint.id),
            title: "Complaint Status Updated".to_string(),
            message: format!(
                "Your complaint #{} status changed from {} to {}",
                complaint.complaint_code, previous, current
            ),
            kind: NotificationKind::StatusUpdate,
        }
    }

    /// Sent to each admin when an asm user submits a complaint.
    pub fn complaint_received(complaint: &Complaint, submitted_by: &str) -> Self {
        Self {
            complaint_id: Some(complaint.id),
            title: "New Complaint Received".to_string(),
            message: format!(
                "New complaint #{} submitted by {}",
                complaint.complaint_code, submitted_by
            ),
            kind: NotificationKind::NewComplaint,
        }
    }

    pub fn addressed_to(self, user_id: i64) -> NewNotification {
        NewNotification {
            user_id,
            complaint_id: self.complaint_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
        }
    }
}

/// A notification ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: i64,
    pub complaint_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

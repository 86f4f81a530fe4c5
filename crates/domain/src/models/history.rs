//! Complaint status history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::complaint::{Complaint, ComplaintStatus};

/// One append-only row per status change. The creation row has no previous status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintHistory {
    pub id: i64,
    pub complaint_id: i64,
    pub previous_status: Option<ComplaintStatus>,
    pub new_status: ComplaintStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Result of a committed status transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub complaint: Complaint,
    /// Status read under the same lock that guarded the write.
    pub previous_status: ComplaintStatus,
    pub history: ComplaintHistory,
}

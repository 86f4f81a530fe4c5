//! Complaint comment thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintComment {
    pub id: i64,
    pub complaint_id: i64,
    pub user_id: i64,
    pub user_role: UserRole,
    pub message: String,
    pub parent_comment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Request payload for posting a comment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Message must be between 1 and 2000 characters"))]
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub message: String,

    pub parent_comment_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub complaint_id: i64,
    pub user_id: i64,
    pub user_role: UserRole,
    pub message: String,
    pub parent_comment_id: Option<i64>,
}

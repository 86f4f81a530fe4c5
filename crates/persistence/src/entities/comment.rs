//! Complaint comment entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::comment::ComplaintComment;
use domain::models::user::UserRole;
use domain::StoreError;
use sqlx::FromRow;

use crate::error::corrupt_row;

/// Database row mapping for the complaint_comments table.
#[derive(Debug, Clone, FromRow)]
pub struct CommentEntity {
    pub id: i64,
    pub complaint_id: i64,
    pub user_id: i64,
    pub user_role: String,
    pub message: String,
    pub parent_comment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CommentEntity> for ComplaintComment {
    type Error = StoreError;

    fn try_from(entity: CommentEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            complaint_id: entity.complaint_id,
            user_id: entity.user_id,
            user_role: entity.user_role.parse::<UserRole>().map_err(corrupt_row)?,
            message: entity.message,
            parent_comment_id: entity.parent_comment_id,
            created_at: entity.created_at,
        })
    }
}

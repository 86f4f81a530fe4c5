//! Notification entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::notification::{Notification, NotificationKind};
use domain::StoreError;
use sqlx::FromRow;

use crate::error::corrupt_row;

pub const NOTIFICATION_COLUMNS: &str =
    "id, user_id, complaint_id, title, message, kind, is_read, created_at";

/// Database row mapping for the notifications table.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: i64,
    pub user_id: i64,
    pub complaint_id: Option<i64>,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationEntity> for Notification {
    type Error = StoreError;

    fn try_from(entity: NotificationEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            user_id: entity.user_id,
            complaint_id: entity.complaint_id,
            title: entity.title,
            message: entity.message,
            kind: entity.kind.parse::<NotificationKind>().map_err(corrupt_row)?,
            is_read: entity.is_read,
            created_at: entity.created_at,
        })
    }
}

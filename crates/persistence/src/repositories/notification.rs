//! Notification repository for database operations.

use async_trait::async_trait;
use domain::models::notification::{NewNotification, Notification};
use domain::store::NotificationStore;
use domain::StoreError;
use sqlx::PgPool;

use super::into_models;
use crate::entities::notification::NOTIFICATION_COLUMNS;
use crate::entities::NotificationEntity;
use crate::error::store_error;
use crate::metrics::QueryTimer;

/// Repository for per-user notifications.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Creates a new NotificationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_for_user(
        &self,
        query_name: &'static str,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let timer = QueryTimer::new(query_name);
        let sql = format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            "#,
            NOTIFICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, NotificationEntity>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        into_models(result?)
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn create(&self, notification: NewNotification) -> Result<Notification, StoreError> {
        let timer = QueryTimer::new("create_notification");
        let sql = format!(
            r#"
            INSERT INTO notifications (user_id, complaint_id, title, message, kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, NotificationEntity>(&sql)
            .bind(notification.user_id)
            .bind(notification.complaint_id)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.kind.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        Notification::try_from(result?)
    }

    async fn list(&self, user_id: i64) -> Result<Vec<Notification>, StoreError> {
        self.fetch_for_user("list_notifications", user_id, false)
            .await
    }

    async fn unread(&self, user_id: i64) -> Result<Vec<Notification>, StoreError> {
        self.fetch_for_user("list_unread_notifications", user_id, true)
            .await
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("mark_notification_read");
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_error);
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, StoreError> {
        let timer = QueryTimer::new("mark_all_notifications_read");
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_error);
        timer.record();
        Ok(result?.rows_affected())
    }
}

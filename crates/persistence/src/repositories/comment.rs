//! Complaint comment repository.

use async_trait::async_trait;
use domain::models::comment::{ComplaintComment, NewComment};
use domain::store::CommentStore;
use domain::StoreError;
use sqlx::PgPool;

use super::into_models;
use crate::entities::CommentEntity;
use crate::error::store_error;
use crate::metrics::QueryTimer;

const COMMENT_COLUMNS: &str =
    "id, complaint_id, user_id, user_role, message, parent_comment_id, created_at";

#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for CommentRepository {
    async fn add(&self, comment: NewComment) -> Result<ComplaintComment, StoreError> {
        let timer = QueryTimer::new("create_comment");
        let sql = format!(
            r#"
            INSERT INTO complaint_comments (complaint_id, user_id, user_role, message, parent_comment_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        );
        let result = sqlx::query_as::<_, CommentEntity>(&sql)
            .bind(comment.complaint_id)
            .bind(comment.user_id)
            .bind(comment.user_role.as_str())
            .bind(&comment.message)
            .bind(comment.parent_comment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        ComplaintComment::try_from(result?)
    }

    async fn list(&self, complaint_id: i64) -> Result<Vec<ComplaintComment>, StoreError> {
        let timer = QueryTimer::new("list_comments");
        let sql = format!(
            "SELECT {} FROM complaint_comments WHERE complaint_id = $1 ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS
        );
        let result = sqlx::query_as::<_, CommentEntity>(&sql)
            .bind(complaint_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        into_models(result?)
    }
}

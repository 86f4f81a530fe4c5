//! Complaint repository for database operations.

use async_trait::async_trait;
use chrono::NaiveDate;
use domain::models::complaint::{
    format_code, Complaint, ComplaintFilter, ComplaintPatch, ComplaintStats, ComplaintStatus,
    NewComplaint,
};
use domain::models::history::{ComplaintHistory, Transition};
use domain::store::ComplaintStore;
use domain::StoreError;
use sqlx::PgPool;

use super::into_models;
use crate::entities::complaint::{complaint_columns, detail_values, DETAIL_COLUMNS};
use crate::entities::{ComplaintEntity, ComplaintHistoryEntity, ComplaintStatsEntity};
use crate::error::store_error;
use crate::metrics::QueryTimer;

const HISTORY_COLUMNS: &str = "id, complaint_id, previous_status, new_status, changed_by, changed_at";

/// Bumps the monthly counter under its row lock and returns the new value.
/// The counter never falls behind serials already stored for the period.
const NEXT_SERIAL_SQL: &str = r#"
    WITH stored AS (
        SELECT COALESCE(MAX(sequence_number), 0) AS high FROM complaints WHERE period = $1
    )
    INSERT INTO complaint_sequences (period, last_value)
    SELECT $1, stored.high + 1 FROM stored
    ON CONFLICT (period) DO UPDATE
        SET last_value = GREATEST(complaint_sequences.last_value, EXCLUDED.last_value - 1) + 1
    RETURNING last_value
"#;

/// Repository for complaints and their status history.
#[derive(Clone)]
pub struct ComplaintRepository {
    pool: PgPool,
}

impl ComplaintRepository {
    /// Creates a new ComplaintRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn insert_sql() -> String {
        let placeholders: Vec<String> = (7..7 + DETAIL_COLUMNS.len())
            .map(|i| format!("${}", i))
            .collect();
        format!(
            r#"
            INSERT INTO complaints (complaint_code, period, sequence_number, user_id, priority, complaint_date, {})
            VALUES ($1, $2, $3, $4, $5, $6, {})
            RETURNING {}
            "#,
            DETAIL_COLUMNS.join(", "),
            placeholders.join(", "),
            complaint_columns()
        )
    }

    fn update_sql() -> String {
        let assignments: Vec<String> = DETAIL_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ${}", column, i + 4))
            .collect();
        format!(
            r#"
            UPDATE complaints
            SET priority = $2, complaint_date = $3, {}, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            assignments.join(", "),
            complaint_columns()
        )
    }
}

/// Wraps a search term for `ILIKE`, escaping its wildcards.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl ComplaintStore for ComplaintRepository {
    async fn create(
        &self,
        complaint: NewComplaint,
        actor: &str,
    ) -> Result<Complaint, StoreError> {
        let timer = QueryTimer::new("create_complaint");

        // Committed on its own so a failed insert still moves the counter on.
        let serial: i32 = sqlx::query_scalar(NEXT_SERIAL_SQL)
            .bind(&complaint.period)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        let code = format_code(&complaint.period, serial);

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let sql = Self::insert_sql();
        let mut insert = sqlx::query_as::<_, ComplaintEntity>(&sql)
            .bind(&code)
            .bind(&complaint.period)
            .bind(serial)
            .bind(complaint.user_id)
            .bind(complaint.priority.as_str())
            .bind(complaint.date);
        for value in detail_values(&complaint.details) {
            insert = insert.bind(value);
        }
        let entity = insert.fetch_one(&mut *tx).await.map_err(store_error)?;

        sqlx::query(
            r#"
            INSERT INTO complaint_history (complaint_id, previous_status, new_status, changed_by)
            VALUES ($1, NULL, $2, $3)
            "#,
        )
        .bind(entity.id)
        .bind(ComplaintStatus::New.as_str())
        .bind(actor)
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        timer.record();
        Complaint::try_from(entity)
    }

    async fn find(&self, id: i64) -> Result<Option<Complaint>, StoreError> {
        let timer = QueryTimer::new("find_complaint");
        let sql = format!("SELECT {} FROM complaints WHERE id = $1", complaint_columns());
        let result = sqlx::query_as::<_, ComplaintEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        result?.map(Complaint::try_from).transpose()
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>, StoreError> {
        let timer = QueryTimer::new("list_complaints");
        let sql = format!(
            r#"
            SELECT {}
            FROM complaints
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR priority = $3)
              AND ($4::TEXT IS NULL
                   OR complaint_code ILIKE $4
                   OR depo_party_name ILIKE $4
                   OR complaint_type ILIKE $4
                   OR product_name ILIKE $4)
            ORDER BY created_at DESC, id DESC
            "#,
            complaint_columns()
        );
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let result = sqlx::query_as::<_, ComplaintEntity>(&sql)
            .bind(filter.owner_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.priority.map(|p| p.as_str()))
            .bind(search)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        into_models(result?)
    }

    async fn update_fields(
        &self,
        id: i64,
        patch: &ComplaintPatch,
    ) -> Result<Option<Complaint>, StoreError> {
        let timer = QueryTimer::new("update_complaint_fields");
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let select = format!(
            "SELECT {} FROM complaints WHERE id = $1 FOR UPDATE",
            complaint_columns()
        );
        let Some(entity) = sqlx::query_as::<_, ComplaintEntity>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_error)?
        else {
            return Ok(None);
        };

        let mut complaint = Complaint::try_from(entity)?;
        complaint.apply_patch(patch, chrono::Utc::now());

        let sql = Self::update_sql();
        let mut update = sqlx::query_as::<_, ComplaintEntity>(&sql)
            .bind(id)
            .bind(complaint.priority.as_str())
            .bind(complaint.date);
        for value in detail_values(&complaint.details) {
            update = update.bind(value);
        }
        let entity = update.fetch_one(&mut *tx).await.map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        timer.record();
        Complaint::try_from(entity).map(Some)
    }

    async fn transition(
        &self,
        id: i64,
        status: ComplaintStatus,
        actor: &str,
    ) -> Result<Option<Transition>, StoreError> {
        let timer = QueryTimer::new("transition_complaint");
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // Row lock: the status read here is the one this write replaces.
        let previous: Option<String> =
            sqlx::query_scalar("SELECT status FROM complaints WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(store_error)?;
        let Some(previous) = previous else {
            return Ok(None);
        };

        let sql = format!(
            "UPDATE complaints SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            complaint_columns()
        );
        let entity = sqlx::query_as::<_, ComplaintEntity>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(store_error)?;

        let history_sql = format!(
            r#"
            INSERT INTO complaint_history (complaint_id, previous_status, new_status, changed_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            HISTORY_COLUMNS
        );
        let history = sqlx::query_as::<_, ComplaintHistoryEntity>(&history_sql)
            .bind(id)
            .bind(&previous)
            .bind(status.as_str())
            .bind(actor)
            .fetch_one(&mut *tx)
            .await
            .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        timer.record();

        let history = ComplaintHistory::try_from(history)?;
        Ok(Some(Transition {
            complaint: Complaint::try_from(entity)?,
            previous_status: history.previous_status.unwrap_or(ComplaintStatus::New),
            history,
        }))
    }

    async fn history(&self, complaint_id: i64) -> Result<Vec<ComplaintHistory>, StoreError> {
        let timer = QueryTimer::new("list_complaint_history");
        let sql = format!(
            "SELECT {} FROM complaint_history WHERE complaint_id = $1 ORDER BY id ASC",
            HISTORY_COLUMNS
        );
        let result = sqlx::query_as::<_, ComplaintHistoryEntity>(&sql)
            .bind(complaint_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        into_models(result?)
    }

    async fn stats(
        &self,
        owner_id: Option<i64>,
        today: NaiveDate,
    ) -> Result<ComplaintStats, StoreError> {
        let timer = QueryTimer::new("complaint_stats");
        let result = sqlx::query_as::<_, ComplaintStatsEntity>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'new') AS new,
                COUNT(*) FILTER (WHERE status = 'in-progress') AS in_progress,
                COUNT(*) FILTER (WHERE status = 'resolved') AS resolved,
                COUNT(*) FILTER (WHERE status = 'closed') AS closed,
                COUNT(*) FILTER (
                    WHERE status = 'resolved' AND (updated_at AT TIME ZONE 'UTC')::DATE = $2
                ) AS resolved_today
            FROM complaints
            WHERE ($1::BIGINT IS NULL OR user_id = $1)
            "#,
        )
        .bind(owner_id)
        .bind(today)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error);
        timer.record();
        Ok(result?.into())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}

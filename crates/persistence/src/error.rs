//! Mapping from sqlx errors to the domain's storage error.

use domain::StoreError;

/// PostgreSQL error code for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

pub fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict(
                db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string()),
            )
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            StoreError::Backend(err.to_string())
        }
    }
}

/// A row whose enum column holds an unknown value.
pub fn corrupt_row(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt row: {}", err))
}

//! User repository for database operations.

use async_trait::async_trait;
use domain::models::user::{NewUser, ProfileUpdate, User, UserRole};
use domain::store::UserStore;
use domain::StoreError;
use sqlx::PgPool;

use super::into_models;
use crate::entities::user::USER_COLUMNS;
use crate::entities::UserEntity;
use crate::error::store_error;
use crate::metrics::QueryTimer;

/// Repository for user accounts.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Creates a new UserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        query_name: &'static str,
        predicate: &str,
        value: &str,
    ) -> Result<Option<User>, StoreError> {
        let timer = QueryTimer::new(query_name);
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, predicate);
        let result = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        result?.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let timer = QueryTimer::new("find_user_by_id");
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let result = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        result?.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one("find_user_by_username", "username = $1", username)
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("find_user_by_email", "LOWER(email) = LOWER($1)", email.trim())
            .await
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>, StoreError> {
        let timer = QueryTimer::new("list_users_by_role");
        let sql = format!(
            "SELECT {} FROM users WHERE role = $1 ORDER BY id",
            USER_COLUMNS
        );
        let result = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        into_models(result?)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let timer = QueryTimer::new("create_user");
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let result = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.phone)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        User::try_from(result?)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError> {
        let timer = QueryTimer::new("update_user_password");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(store_error);
        timer.record();
        Ok(result?.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, StoreError> {
        let timer = QueryTimer::new("update_user_profile");
        let sql = format!(
            r#"
            UPDATE users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let result = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.email)
            .bind(&update.phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error);
        timer.record();
        result?.map(User::try_from).transpose()
    }
}

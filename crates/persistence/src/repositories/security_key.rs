//! Security key repository.

use async_trait::async_trait;
use domain::models::user::SecurityKey;
use domain::store::SecurityKeyStore;
use domain::StoreError;
use sqlx::PgPool;

use crate::entities::SecurityKeyEntity;
use crate::error::store_error;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct SecurityKeyRepository {
    pool: PgPool,
}

impl SecurityKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityKeyStore for SecurityKeyRepository {
    async fn active_keys(&self) -> Result<Vec<SecurityKey>, StoreError> {
        let timer = QueryTimer::new("list_active_security_keys");
        let result = sqlx::query_as::<_, SecurityKeyEntity>(
            r#"
            SELECT id, name, key_hash, is_active, created_at
            FROM security_keys
            WHERE is_active = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error);
        timer.record();
        Ok(result?.into_iter().map(SecurityKey::from).collect())
    }

    async fn create(&self, name: &str, key_hash: &str) -> Result<SecurityKey, StoreError> {
        let timer = QueryTimer::new("create_security_key");
        let result = sqlx::query_as::<_, SecurityKeyEntity>(
            r#"
            INSERT INTO security_keys (name, key_hash)
            VALUES ($1, $2)
            RETURNING id, name, key_hash, is_active, created_at
            "#,
        )
        .bind(name)
        .bind(key_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error);
        timer.record();
        Ok(result?.into())
    }
}

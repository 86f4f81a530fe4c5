//! Security key entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::user::SecurityKey;
use sqlx::FromRow;

/// Database row mapping for the security_keys table.
#[derive(Debug, Clone, FromRow)]
pub struct SecurityKeyEntity {
    pub id: i64,
    pub name: String,
    pub key_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SecurityKeyEntity> for SecurityKey {
    fn from(entity: SecurityKeyEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            key_hash: entity.key_hash,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}

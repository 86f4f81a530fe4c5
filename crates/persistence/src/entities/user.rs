//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::user::{User, UserRole};
use domain::StoreError;
use sqlx::FromRow;

use crate::error::corrupt_row;

/// Column list shared by every user query.
pub const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, first_name, last_name, phone, created_at, updated_at";

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserEntity> for User {
    type Error = StoreError;

    fn try_from(entity: UserEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            username: entity.username,
            email: entity.email,
            password_hash: entity.password_hash,
            role: entity.role.parse::<UserRole>().map_err(corrupt_row)?,
            first_name: entity.first_name,
            last_name: entity.last_name,
            phone: entity.phone,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

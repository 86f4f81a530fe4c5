//! Persistence layer for the complaint desk backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - SQL migrations under `src/migrations`

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;

use std::sync::Arc;

use domain::Stores;
use sqlx::PgPool;

use repositories::{
    CommentRepository, ComplaintRepository, NotificationRepository, SecurityKeyRepository,
    UserRepository,
};

/// Builds the Postgres-backed store set over one shared pool.
pub fn pg_stores(pool: PgPool) -> Stores {
    Stores {
        users: Arc::new(UserRepository::new(pool.clone())),
        security_keys: Arc::new(SecurityKeyRepository::new(pool.clone())),
        complaints: Arc::new(ComplaintRepository::new(pool.clone())),
        comments: Arc::new(CommentRepository::new(pool.clone())),
        notifications: Arc::new(NotificationRepository::new(pool)),
    }
}

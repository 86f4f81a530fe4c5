//! Admin bootstrap for initial setup.
//!
//! Creates the configured admin account and security key on startup. Both
//! steps are idempotent and skip anything that already exists.

use domain::models::user::{NewUser, UserRole};
use domain::{StoreError, Stores};
use shared::crypto::sha256_hex;
use shared::password::{hash_password, PasswordError};
use tracing::{info, warn};

use crate::config::AdminBootstrapConfig;

/// Name under which the configured security key is stored.
pub const BOOTSTRAP_KEY_NAME: &str = "bootstrap";

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordError),
}

/// What a bootstrap run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub admin_created: bool,
    pub key_created: bool,
}

/// Should be called after migrations on startup.
pub async fn bootstrap_admin(
    stores: &Stores,
    config: &AdminBootstrapConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    let mut outcome = BootstrapOutcome::default();

    if !config.email.is_empty() && !config.username.is_empty() {
        if config.password.is_empty() {
            warn!("CD__ADMIN__EMAIL is set but CD__ADMIN__PASSWORD is empty - skipping admin bootstrap");
        } else {
            outcome.admin_created = create_admin(stores, config).await?;
        }
    }

    if !config.security_key.is_empty() {
        outcome.key_created = create_security_key(stores, &config.security_key).await?;
    }

    Ok(outcome)
}

async fn create_admin(stores: &Stores, config: &AdminBootstrapConfig) -> Result<bool, BootstrapError> {
    let email = config.email.trim().to_lowercase();
    if stores.users.find_by_email(&email).await?.is_some()
        || stores.users.find_by_username(config.username.trim()).await?.is_some()
    {
        info!("Bootstrap admin already exists - skipping");
        return Ok(false);
    }

    let user = stores
        .users
        .create(NewUser {
            username: config.username.trim().to_string(),
            email,
            password_hash: hash_password(&config.password)?,
            role: UserRole::Admin,
            first_name: Some("System".into()),
            last_name: Some("Administrator".into()),
            phone: None,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "Bootstrap admin user created");
    warn!("SECURITY: Remove CD__ADMIN__PASSWORD from configuration after initial setup");
    Ok(true)
}

async fn create_security_key(stores: &Stores, secret: &str) -> Result<bool, BootstrapError> {
    let keys = stores.security_keys.active_keys().await?;
    if keys.iter().any(|k| k.name == BOOTSTRAP_KEY_NAME) {
        return Ok(false);
    }

    match stores
        .security_keys
        .create(BOOTSTRAP_KEY_NAME, &sha256_hex(secret))
        .await
    {
        Ok(key) => {
            info!(key_id = key.id, "Bootstrap security key created");
            Ok(true)
        }
        // An inactive key with the same name already holds the slot.
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::memory::InMemoryStore;
    use std::sync::Arc;

    fn config() -> AdminBootstrapConfig {
        AdminBootstrapConfig {
            username: "admin".into(),
            email: "Admin@Example.com".into(),
            password: "admin-pass".into(),
            security_key: "open-sesame".into(),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_creates_admin_and_key_once() {
        let stores = Arc::new(InMemoryStore::new()).stores();

        let first = bootstrap_admin(&stores, &config()).await.unwrap();
        assert_eq!(
            first,
            BootstrapOutcome {
                admin_created: true,
                key_created: true
            }
        );

        let admin = stores
            .users
            .find_by_email("admin@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, UserRole::Admin);

        let keys = stores.security_keys.active_keys().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_hash, sha256_hex("open-sesame"));

        let second = bootstrap_admin(&stores, &config()).await.unwrap();
        assert_eq!(second, BootstrapOutcome::default());
    }

    #[tokio::test]
    async fn test_bootstrap_skips_without_password() {
        let stores = Arc::new(InMemoryStore::new()).stores();
        let cfg = AdminBootstrapConfig {
            password: String::new(),
            security_key: String::new(),
            ..config()
        };

        let outcome = bootstrap_admin(&stores, &cfg).await.unwrap();
        assert!(!outcome.admin_created);
        assert!(stores
            .users
            .find_by_username("admin")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_noop_when_unconfigured() {
        let stores = Arc::new(InMemoryStore::new()).stores();
        let outcome = bootstrap_admin(&stores, &AdminBootstrapConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::default());
    }
}

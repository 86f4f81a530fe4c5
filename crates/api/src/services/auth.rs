//! Authentication service: registration, login, password changes and the
//! OTP password-reset flow.

use std::sync::Arc;

use domain::models::user::{NewUser, User, UserRole};
use domain::services::{OtpError, OtpStore};
use domain::store::{SecurityKeyStore, UserStore};
use domain::StoreError;
use shared::crypto::digest_matches;
use shared::jwt::{JwtConfig, JwtError};
use shared::password::{hash_password, meets_policy, verify_password, PasswordError};
use thiserror::Error;

use crate::middleware::rate_limit::RateLimiterState;
use crate::services::email::{EmailError, EmailService};

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("Invalid security key")]
    InvalidSecurityKey,

    #[error("Current password or security key is required")]
    MissingFactor,

    #[error("Too many OTP requests")]
    OtpRateLimited { retry_after_secs: u64 },

    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error("Failed to send OTP email: {0}")]
    Email(#[from] EmailError),

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: User,
    pub token: String,
    pub expires_in: i64,
}

/// Registration input, already validated at the boundary.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    security_keys: Arc<dyn SecurityKeyStore>,
    jwt: Arc<JwtConfig>,
    otp: Arc<OtpStore>,
    otp_limiter: Arc<RateLimiterState<String>>,
    email: EmailService,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        security_keys: Arc<dyn SecurityKeyStore>,
        jwt: Arc<JwtConfig>,
        otp: Arc<OtpStore>,
        otp_limiter: Arc<RateLimiterState<String>>,
        email: EmailService,
    ) -> Self {
        Self {
            users,
            security_keys,
            jwt,
            otp,
            otp_limiter,
            email,
        }
    }

    pub fn otp_limiter(&self) -> &Arc<RateLimiterState<String>> {
        &self.otp_limiter
    }

    /// Registers an asm user and signs them in.
    pub async fn register(&self, registration: Registration) -> Result<AuthResult, AuthError> {
        if !meets_policy(&registration.password) {
            return Err(AuthError::WeakPassword(shared::password::MIN_PASSWORD_LENGTH));
        }

        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_lowercase();

        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self
            .users
            .create(NewUser {
                username,
                email,
                password_hash,
                role: UserRole::Asm,
                first_name: registration.first_name,
                last_name: registration.last_name,
                phone: registration.phone,
            })
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration.
                StoreError::Conflict(detail) if detail.contains("email") => AuthError::EmailTaken,
                StoreError::Conflict(_) => AuthError::UsernameTaken,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        self.sign_in(user)
    }

    /// Username login for asm users.
    pub async fn login_asm(&self, username: &str, password: &str) -> Result<AuthResult, AuthError> {
        let user = self.users.find_by_username(username.trim()).await?;
        self.login(user, password, UserRole::Asm)
    }

    /// Email login for admins.
    pub async fn login_admin(&self, email: &str, password: &str) -> Result<AuthResult, AuthError> {
        let user = self.users.find_by_email(email.trim()).await?;
        self.login(user, password, UserRole::Admin)
    }

    fn login(
        &self,
        user: Option<User>,
        password: &str,
        role: UserRole,
    ) -> Result<AuthResult, AuthError> {
        let user = user.ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        // Same answer as a bad password so the endpoint does not reveal roles.
        if user.role != role {
            tracing::warn!(user_id = user.id, role = %user.role, "Login with wrong role");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = user.id, role = %user.role, "User logged in");
        self.sign_in(user)
    }

    fn sign_in(&self, user: User) -> Result<AuthResult, AuthError> {
        let (token, _jti) = self
            .jwt
            .issue(user.id, &user.username, user.role.as_str())?;
        Ok(AuthResult {
            user,
            token,
            expires_in: self.jwt.expiry_secs,
        })
    }

    /// Changes a password. Every supplied factor must check out and at least
    /// one of current password or security key is required.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: Option<&str>,
        security_key: Option<&str>,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let current_password = current_password.filter(|p| !p.is_empty());
        let security_key = security_key.map(str::trim).filter(|k| !k.is_empty());
        if current_password.is_none() && security_key.is_none() {
            return Err(AuthError::MissingFactor);
        }
        if !meets_policy(new_password) {
            return Err(AuthError::WeakPassword(shared::password::MIN_PASSWORD_LENGTH));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Some(current) = current_password {
            if !verify_password(current, &user.password_hash)? {
                return Err(AuthError::WrongCurrentPassword);
            }
        }
        if let Some(key) = security_key {
            let keys = self.security_keys.active_keys().await?;
            // Compare against every key so timing does not reveal which matched.
            let matched = keys
                .iter()
                .fold(false, |acc, k| digest_matches(key, &k.key_hash) | acc);
            if !matched {
                tracing::warn!(user_id, "Password change with invalid security key");
                return Err(AuthError::InvalidSecurityKey);
            }
        }

        self.store_password(user.id, new_password).await?;
        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Issues a reset code for a registered email and mails it. Only
    /// registered addresses get a limiter entry.
    pub async fn send_otp(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if let Err(retry_after_secs) = self.otp_limiter.check(&user.email.to_lowercase()) {
            return Err(AuthError::OtpRateLimited { retry_after_secs });
        }

        let code = self.otp.issue(&user.email);
        if let Err(e) = self
            .email
            .send_otp_email(&user.email, &code, self.otp.policy().ttl.num_minutes())
            .await
        {
            // An undeliverable code must not stay redeemable.
            self.otp.discard(&user.email);
            return Err(e.into());
        }

        tracing::info!(user_id = user.id, "Password reset code issued");
        Ok(())
    }

    pub fn verify_otp(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.otp.verify(email, code).map_err(|e| {
            tracing::debug!(error = %e, "OTP verification failed");
            AuthError::Otp(e)
        })
    }

    /// Sets a new password after a verified OTP. The OTP entry is consumed
    /// before the password is hashed or written, whatever the outcome.
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.otp.consume_verified(email, code)?;

        if !meets_policy(new_password) {
            return Err(AuthError::WeakPassword(shared::password::MIN_PASSWORD_LENGTH));
        }
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.store_password(user.id, new_password).await?;
        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    async fn store_password(&self, user_id: i64, password: &str) -> Result<(), AuthError> {
        let hash = hash_password(password)?;
        if self.users.update_password(user_id, &hash).await? {
            Ok(())
        } else {
            Err(AuthError::UserNotFound)
        }
    }
}

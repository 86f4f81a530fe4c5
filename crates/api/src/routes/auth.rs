//! Authentication routes: registration, login and password change.

use axum::{extract::State, http::StatusCode, Json};
use domain::models::user::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;
use crate::services::{AuthResult, Registration};

/// Request body for asm registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom(function = "shared::validation::validate_username"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(custom(function = "shared::validation::validate_contact_number"))]
    pub phone: Option<String>,
}

/// Asm users sign in with their username.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AsmLoginRequest {
    #[serde(alias = "username")]
    #[validate(length(min = 1, message = "Username is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Admins sign in with their email.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,

    pub security_key: Option<String>,

    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

impl AuthResponse {
    fn new(message: &str, result: AuthResult) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            token: result.token,
            expires_in: result.expires_in,
            user: result.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// POST /api/asm/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    request.validate()?;

    let result = state
        .auth
        .register(Registration {
            username: request.username,
            email: request.email,
            password: request.password,
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("Account created successfully", result)),
    ))
}

/// POST /api/asm/login
pub async fn asm_login(
    State(state): State<AppState>,
    Json(request): Json<AsmLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;
    let result = state
        .auth
        .login_asm(&request.identifier, &request.password)
        .await?;
    Ok(Json(AuthResponse::new("Login successful", result)))
}

/// POST /api/admin/login
pub async fn admin_login(
    State(state): State<AppState>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;
    let result = state
        .auth
        .login_admin(&request.email, &request.password)
        .await?;
    Ok(Json(AuthResponse::new("Login successful", result)))
}

/// POST /api/change-password
pub async fn change_password(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state
        .auth
        .change_password(
            auth.user_id,
            request.current_password.as_deref(),
            request.security_key.as_deref(),
            &request.new_password,
        )
        .await?;
    Ok(Json(MessageResponse::ok("Password changed successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "asm.north",
            "email": "north@example.com",
            "password": "secret1",
            "firstName": "Nora",
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_register_request_short_password() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "asm.north",
            "email": "north@example.com",
            "password": "123",
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_register_request_invalid_email() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "asm.north",
            "email": "not-an-email",
            "password": "secret1",
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_asm_login_accepts_username_alias() {
        let request: AsmLoginRequest = serde_json::from_value(serde_json::json!({
            "username": "asm.north",
            "password": "secret1",
        }))
        .unwrap();
        assert_eq!(request.identifier, "asm.north");
    }

    #[test]
    fn test_change_password_request_requires_length() {
        let request = ChangePasswordRequest {
            current_password: Some("old".into()),
            security_key: None,
            new_password: "abc".into(),
        };
        assert!(request.validate().is_err());
    }
}

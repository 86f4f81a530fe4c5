//! Forgot-password routes.
//!
//! The flow is send-otp, then verify-otp, then reset-password. Every step
//! answers `{success, message}`; any failure can be recovered by starting
//! over from send-otp.

use axum::{extract::State, Json};
use serde::Deserialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::auth::MessageResponse;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "shared::validation::validate_otp_code"))]
    pub otp: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "shared::validation::validate_otp_code"))]
    pub otp: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// POST /api/forgot-password/send-otp
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state.auth.send_otp(&request.email).await?;
    Ok(Json(MessageResponse::ok(
        "OTP sent to your email. It is valid for a few minutes.",
    )))
}

/// POST /api/forgot-password/verify-otp
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state.auth.verify_otp(&request.email, &request.otp)?;
    Ok(Json(MessageResponse::ok("OTP verified successfully")))
}

/// POST /api/forgot-password/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;
    state
        .auth
        .reset_password(&request.email, &request.otp, &request.new_password)
        .await?;
    Ok(Json(MessageResponse::ok("Password reset successfully")))
}

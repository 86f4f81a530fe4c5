//! Profile routes for the authenticated user.

use axum::{extract::State, Json};
use domain::models::user::{ProfileUpdate, User};
use domain::StoreError;
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: User,
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .stores
        .users
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(mut update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, ApiError> {
    update.validate()?;
    update.email = update.email.map(|e| e.trim().to_lowercase());

    let user = state
        .stores
        .users
        .update_profile(auth.user_id, &update)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::Conflict("Email already registered".into()),
            other => other.into(),
        })?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    tracing::info!(user_id = user.id, "Profile updated");
    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

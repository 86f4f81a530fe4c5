//! Notification routes for the authenticated user.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::notification::Notification;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;
use crate::routes::auth::MessageResponse;

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub success: bool,
    pub message: String,
    pub updated: u64,
}

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.notifications.list(auth.user_id).await?))
}

/// GET /api/notifications/unread
pub async fn unread(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.notifications.unread(auth.user_id).await?))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.notifications.mark_read(id, auth.user_id).await?;
    Ok(Json(MessageResponse::ok("Notification marked as read")))
}

/// POST /api/notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: UserAuth,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.notifications.mark_all_read(auth.user_id).await?;
    tracing::debug!(user_id = auth.user_id, updated, "Notifications marked read");
    Ok(Json(MarkAllReadResponse {
        success: true,
        message: "All notifications marked as read".to_string(),
        updated,
    }))
}

//! Complaint comment thread routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::comment::{CommentRequest, ComplaintComment};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::UserAuth;

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: ComplaintComment,
}

/// GET /api/complaints/:id/comments
pub async fn list_comments(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ComplaintComment>>, ApiError> {
    Ok(Json(state.lifecycle.comments(&auth.actor(), id).await?))
}

/// POST /api/complaints/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    request.validate()?;
    let comment = state
        .lifecycle
        .add_comment(&auth.actor(), id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            comment,
        }),
    ))
}

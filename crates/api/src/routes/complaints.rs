//! Complaint routes.
//!
//! Asm users work on their own complaints under `/api/asm`; admins see every
//! complaint under `/api/complaints` and are the only callers that change
//! status.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::complaint::{
    Complaint, ComplaintDraft, ComplaintFilter, ComplaintPatch, ComplaintStats, ComplaintStatus,
    Priority,
};
use domain::models::history::ComplaintHistory;
use domain::services::{Actor, LifecycleError};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{AdminUser, AsmUser};
use crate::middleware::UserAuth;

/// Listing filters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    /// Parses enumerated filters; blank or `all` means no filter.
    pub fn into_filter(self) -> Result<ComplaintFilter, ApiError> {
        Ok(ComplaintFilter {
            status: parse_filter::<ComplaintStatus>(self.status.as_deref())?,
            priority: parse_filter::<Priority>(self.priority.as_deref())?,
            search: self.search.filter(|s| !s.trim().is_empty()),
            owner_id: None,
        })
    }
}

fn parse_filter<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ApiError::InvalidInput(e.to_string())),
    }
}

/// Admin update: field patch plus an optional status change.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdminUpdateRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub patch: ComplaintPatch,

    #[serde(default)]
    pub status: Option<String>,
}

impl AdminUpdateRequest {
    /// Target status. Only an absent field means no change; blank or
    /// unknown values are rejected.
    pub fn target_status(&self) -> Result<Option<ComplaintStatus>, ApiError> {
        self.status
            .as_deref()
            .map(str::parse::<ComplaintStatus>)
            .transpose()
            .map_err(|e| ApiError::InvalidInput(e.to_string()))
    }
}

/// Asm update: the field patch only. A `status` key is refused rather than
/// dropped so it cannot pass for a transition.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AsmUpdateRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub patch: ComplaintPatch,

    #[serde(default)]
    status: Option<serde_json::Value>,
}

impl AsmUpdateRequest {
    fn into_patch(self) -> Result<ComplaintPatch, ApiError> {
        match self.status {
            Some(_) => Err(ApiError::InvalidInput(
                "status can only be changed by an admin".to_string(),
            )),
            None => Ok(self.patch),
        }
    }
}

/// Values accepted for the enumerated complaint fields.
#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub success: bool,
    pub statuses: Vec<&'static str>,
    pub priorities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    pub complaint_code: String,
    pub id: i64,
    pub complaint: Complaint,
}

#[derive(Debug, Serialize)]
pub struct ComplaintResponse {
    pub success: bool,
    pub message: String,
    pub complaint: Complaint,
}

impl ComplaintResponse {
    fn updated(complaint: Complaint) -> Self {
        Self {
            success: true,
            message: "Complaint updated successfully".to_string(),
            complaint,
        }
    }
}

/// Creates the complaint, resubmitting once after a serial collision.
async fn submit(
    state: &AppState,
    actor: &Actor,
    draft: ComplaintDraft,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    draft.validate()?;

    let complaint = match state.lifecycle.create(actor, draft.clone()).await {
        Err(LifecycleError::RetryableConflict) => {
            tracing::info!(user_id = actor.user_id, "Retrying complaint submission");
            state.lifecycle.create(actor, draft).await?
        }
        other => other?,
    };

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: "Complaint submitted successfully".to_string(),
            complaint_code: complaint.complaint_code.clone(),
            id: complaint.id,
            complaint,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Asm routes
// ---------------------------------------------------------------------------

/// POST /api/asm/complaints
pub async fn asm_submit(
    State(state): State<AppState>,
    AsmUser(auth): AsmUser,
    Json(draft): Json<ComplaintDraft>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    submit(&state, &auth.actor(), draft).await
}

/// GET /api/asm/complaints
pub async fn asm_list(
    State(state): State<AppState>,
    AsmUser(auth): AsmUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Complaint>>, ApiError> {
    let complaints = state
        .lifecycle
        .list(&auth.actor(), query.into_filter()?)
        .await?;
    Ok(Json(complaints))
}

/// GET /api/asm/complaints/:id
pub async fn asm_get(
    State(state): State<AppState>,
    AsmUser(auth): AsmUser,
    Path(id): Path<i64>,
) -> Result<Json<Complaint>, ApiError> {
    Ok(Json(state.lifecycle.get(&auth.actor(), id).await?))
}

/// PATCH /api/asm/complaints/:id
///
/// Field update only; status is managed by admins.
pub async fn asm_update(
    State(state): State<AppState>,
    AsmUser(auth): AsmUser,
    Path(id): Path<i64>,
    Json(request): Json<AsmUpdateRequest>,
) -> Result<Json<ComplaintResponse>, ApiError> {
    let patch = request.into_patch()?;
    patch.validate()?;
    state.lifecycle.get(&auth.actor(), id).await?;
    let complaint = state.lifecycle.update_fields(id, &patch).await?;
    Ok(Json(ComplaintResponse::updated(complaint)))
}

/// GET /api/asm/my-stats
pub async fn asm_stats(
    State(state): State<AppState>,
    AsmUser(auth): AsmUser,
) -> Result<Json<ComplaintStats>, ApiError> {
    Ok(Json(state.lifecycle.stats(Some(auth.user_id)).await?))
}

// ---------------------------------------------------------------------------
// Admin routes
// ---------------------------------------------------------------------------

/// GET /api/complaints
pub async fn admin_list(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Complaint>>, ApiError> {
    let complaints = state
        .lifecycle
        .list(&auth.actor(), query.into_filter()?)
        .await?;
    Ok(Json(complaints))
}

/// POST /api/complaints
pub async fn admin_submit(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Json(draft): Json<ComplaintDraft>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    submit(&state, &auth.actor(), draft).await
}

/// GET /api/complaints/stats
pub async fn admin_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ComplaintStats>, ApiError> {
    Ok(Json(state.lifecycle.stats(None).await?))
}

/// GET /api/complaints/:id
pub async fn admin_get(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Complaint>, ApiError> {
    Ok(Json(state.lifecycle.get(&auth.actor(), id).await?))
}

/// PATCH /api/complaints/:id
///
/// Applies the field patch, then transitions status when it differs from the
/// stored value. The admin's username is recorded as the actor.
pub async fn admin_update(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<AdminUpdateRequest>,
) -> Result<Json<ComplaintResponse>, ApiError> {
    request.validate()?;
    let status = request.target_status()?;

    let mut complaint = state.lifecycle.get(&auth.actor(), id).await?;
    if !request.patch.is_empty() {
        complaint = state.lifecycle.update_fields(id, &request.patch).await?;
    }
    if let Some(status) = status.filter(|s| *s != complaint.status) {
        complaint = state
            .lifecycle
            .transition_status(id, status, &auth.username)
            .await?;
    }

    Ok(Json(ComplaintResponse::updated(complaint)))
}

// ---------------------------------------------------------------------------
// Shared routes
// ---------------------------------------------------------------------------

/// GET /api/complaints/options
pub async fn options(_auth: UserAuth) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        success: true,
        statuses: ComplaintStatus::ALL.iter().map(ComplaintStatus::as_str).collect(),
        priorities: Priority::ALL.iter().map(Priority::as_str).collect(),
    })
}

/// GET /api/complaints/:id/history
pub async fn history(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ComplaintHistory>>, ApiError> {
    Ok(Json(state.lifecycle.history(&auth.actor(), id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(status: Option<&str>, priority: Option<&str>) -> ListQuery {
        ListQuery {
            status: status.map(Into::into),
            priority: priority.map(Into::into),
            search: Some("  ".into()),
        }
    }

    #[test]
    fn test_filter_parsing() {
        let filter = query(Some("in-progress"), Some("HIGH")).into_filter().unwrap();
        assert_eq!(filter.status, Some(ComplaintStatus::InProgress));
        assert_eq!(filter.priority, Some(Priority::High));
        assert_eq!(filter.search, None);
        assert_eq!(filter.owner_id, None);
    }

    #[test]
    fn test_filter_all_means_none() {
        let filter = query(Some("all"), Some("")).into_filter().unwrap();
        assert_eq!(filter.status, None);
        assert_eq!(filter.priority, None);
    }

    #[test]
    fn test_filter_rejects_unknown_status() {
        assert!(matches!(
            query(Some("pending"), None).into_filter(),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            query(None, Some("urgent")).into_filter(),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_admin_update_request_splits_status() {
        let request: AdminUpdateRequest = serde_json::from_value(serde_json::json!({
            "status": "resolved",
            "actionTaken": "Replaced unit",
            "priority": "high",
        }))
        .unwrap();
        assert_eq!(request.status.as_deref(), Some("resolved"));
        assert_eq!(request.patch.priority, Some(Priority::High));
        assert!(!request.patch.is_empty());
        assert_eq!(
            request.target_status().unwrap(),
            Some(ComplaintStatus::Resolved)
        );
    }

    #[test]
    fn test_admin_update_status_is_strict() {
        let parse = |status: serde_json::Value| {
            let request: AdminUpdateRequest =
                serde_json::from_value(serde_json::json!({ "status": status })).unwrap();
            request.target_status()
        };
        assert!(matches!(parse("all".into()), Err(ApiError::InvalidInput(_))));
        assert!(matches!(parse("".into()), Err(ApiError::InvalidInput(_))));
        assert_eq!(parse(serde_json::Value::Null).unwrap(), None);

        let absent: AdminUpdateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.target_status().unwrap(), None);
    }

    #[test]
    fn test_asm_update_refuses_status_key() {
        let request: AsmUpdateRequest = serde_json::from_value(serde_json::json!({
            "status": "closed",
            "actionTaken": "Replaced unit",
        }))
        .unwrap();
        assert!(matches!(request.into_patch(), Err(ApiError::InvalidInput(_))));

        let request: AsmUpdateRequest =
            serde_json::from_value(serde_json::json!({ "actionTaken": "Replaced unit" })).unwrap();
        assert!(!request.into_patch().unwrap().is_empty());
    }
}

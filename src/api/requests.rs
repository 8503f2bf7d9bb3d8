use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResponse, AppState};
use crate::models::{IssuedInviteCode, OrgView};
use crate::services::{ServiceError, parse_status, requests};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub id: String,
    pub status: String,
}

/// Status update result. `inviteCode` is present only for approvals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub data: OrgView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<IssuedInviteCode>,
}

/// Orgs waiting on (or going through) verification
///
/// GET /v1/requests
pub async fn list_requests(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OrgView>>>, ApiError> {
    Ok(ApiResponse::ok(requests::list_requests(&state.ctx).await?))
}

/// Move a request to a new verification status
///
/// POST /v1/requests/status
///
/// ## Request
/// ```json
/// { "id": "3f0c...", "status": "approved" }
/// ```
///
/// Approving requires the org to be `under_review` and issues an invite code
/// valid for 30 days.
pub async fn update_request_status(
    State(state): State<AppState>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let status = parse_status(Some(req.status))?
        .ok_or_else(|| ServiceError::validation("Missing required fields", &["status"]))?;

    let update = requests::update_request_status(&state.ctx, &req.id, status).await?;

    Ok(Json(UpdateStatusResponse {
        success: true,
        data: update.org,
        invite_code: update.invite_code,
    }))
}

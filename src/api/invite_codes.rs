use axum::{
    Json,
    extract::{Path, State},
};

use super::{ApiError, ApiResponse, AppState};
use crate::models::InviteCodeRecord;
use crate::services::invite_codes;

/// Invite codes with the orgs that redeemed them
///
/// GET /v1/invite-codes
pub async fn list_invite_codes(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<InviteCodeRecord>>>, ApiError> {
    Ok(ApiResponse::ok(invite_codes::list_invite_codes(&state.ctx).await?))
}

/// DELETE /v1/invite-codes/{id}
pub async fn delete_invite_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    invite_codes::delete_invite_code(&state.ctx, &id).await?;
    Ok(ApiResponse::message("Invite code deleted successfully"))
}

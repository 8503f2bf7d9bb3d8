use axum::{Json, extract::State};
use chrono::Utc;

use super::{ApiError, ApiResponse, AppState};
use crate::services::dashboard::{self, Dashboard};

/// Counters, month-over-month change and recent activity
///
/// GET /v1/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    Ok(ApiResponse::ok(
        dashboard::dashboard(&state.ctx, Utc::now()).await?,
    ))
}

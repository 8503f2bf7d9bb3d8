use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::form::FormData;
use super::{ApiError, ApiResponse, AppState};
use crate::models::ProtestRecord;
use crate::services::protests::{self, CreateProtestInput, UpdateProtestInput};

/// GET /v1/protests
pub async fn list_protests(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProtestRecord>>>, ApiError> {
    Ok(ApiResponse::ok(protests::list_protests(&state.ctx).await?))
}

/// GET /v1/protests/{id}
pub async fn get_protest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProtestRecord>>, ApiError> {
    Ok(ApiResponse::ok(protests::get_protest(&state.ctx, &id).await?))
}

/// Create a protest
///
/// POST /v1/protests
///
/// Fields: `title`, `location`, `dateTime`, `organizerId`, optional
/// `description`, `city`, `country` and `picture` (file).
pub async fn create_protest(
    State(state): State<AppState>,
    mut form: FormData,
) -> Result<(StatusCode, Json<ApiResponse<ProtestRecord>>), ApiError> {
    let input = CreateProtestInput {
        title: form.take("title"),
        description: form.take("description"),
        location: form.take("location"),
        city: form.take("city"),
        country: form.take("country"),
        date_time: form.take("dateTime"),
        organizer_id: form.take("organizerId"),
    };

    let protest = protests::create_protest(&state.ctx, input, form.picture).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(protest)))
}

/// PUT /v1/protests/{id}
pub async fn update_protest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: FormData,
) -> Result<Json<ApiResponse<ProtestRecord>>, ApiError> {
    let input = UpdateProtestInput {
        title: form.take("title"),
        description: form.take("description"),
        location: form.take("location"),
        city: form.take("city"),
        country: form.take("country"),
        date_time: form.take("dateTime"),
    };

    let protest = protests::update_protest(&state.ctx, &id, input, form.picture).await?;
    Ok(ApiResponse::ok(protest))
}

/// DELETE /v1/protests/{id}
pub async fn delete_protest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    protests::delete_protest(&state.ctx, &id).await?;
    Ok(ApiResponse::message("Protest deleted successfully"))
}

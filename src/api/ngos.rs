use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::form::FormData;
use super::{ApiError, ApiResponse, AppState};
use crate::models::OrgView;
use crate::services::ngos::{self, CreateNgoInput, UpdateNgoInput};

/// List verified NGOs
///
/// GET /v1/ngos
pub async fn list_ngos(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OrgView>>>, ApiError> {
    Ok(ApiResponse::ok(ngos::list_ngos(&state.ctx).await?))
}

/// GET /v1/ngos/{id}
pub async fn get_ngo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrgView>>, ApiError> {
    Ok(ApiResponse::ok(ngos::get_ngo(&state.ctx, &id).await?))
}

/// Create an NGO from a multipart form
///
/// POST /v1/ngos
///
/// Fields: `username`, `name`, `country`, `socialMediaPlatform`,
/// `socialMediaHandle`, `password`, optional `verificationStatus` and
/// `picture` (file).
pub async fn create_ngo(
    State(state): State<AppState>,
    mut form: FormData,
) -> Result<(StatusCode, Json<ApiResponse<OrgView>>), ApiError> {
    let input = CreateNgoInput {
        username: form.take("username"),
        name: form.take("name"),
        country: form.take("country"),
        social_media_platform: form.take("socialMediaPlatform"),
        social_media_handle: form.take("socialMediaHandle"),
        password: form.take("password"),
        verification_status: form.take("verificationStatus"),
    };

    let org = ngos::create_ngo(&state.ctx, input, form.picture).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(org)))
}

/// Update an NGO. The password cannot be changed here.
///
/// PUT /v1/ngos/{id}
pub async fn update_ngo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: FormData,
) -> Result<Json<ApiResponse<OrgView>>, ApiError> {
    let input = UpdateNgoInput {
        username: form.take("username"),
        name: form.take("name"),
        country: form.take("country"),
        social_media_platform: form.take("socialMediaPlatform"),
        social_media_handle: form.take("socialMediaHandle"),
        verification_status: form.take("verificationStatus"),
    };

    let org = ngos::update_ngo(&state.ctx, &id, input, form.picture).await?;
    Ok(ApiResponse::ok(org))
}

/// DELETE /v1/ngos/{id}
pub async fn delete_ngo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    ngos::delete_ngo(&state.ctx, &id).await?;
    Ok(ApiResponse::message(
        "NGO and associated invite code deleted successfully",
    ))
}

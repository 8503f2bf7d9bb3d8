// ============================================
// Response envelope and error mapping
// ============================================
//
// Every endpoint answers with `{ success, data?, error?, details? }`.
// Failures never leak store or storage internals; those are logged here.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::services::ServiceError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            details: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
            details: None,
        })
    }

    fn failure(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
            details,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("missing or invalid admin token")]
    Unauthorized,

    /// Body could not be read as the expected JSON or multipart form.
    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::failure("Unauthorized", None),
            ),
            ApiError::BadRequest(details) => (
                StatusCode::BAD_REQUEST,
                ApiResponse::failure("Invalid request", Some(details)),
            ),
            ApiError::Service(err) => service_failure(err),
        };

        (status, Json(body)).into_response()
    }
}

fn service_failure(err: ServiceError) -> (StatusCode, ApiResponse<()>) {
    match err {
        ServiceError::Validation { message, fields } => {
            let details = (!fields.is_empty()).then(|| fields.join(", "));
            (StatusCode::BAD_REQUEST, ApiResponse::failure(message, details))
        }
        ServiceError::NotFound(entity) => (
            StatusCode::NOT_FOUND,
            ApiResponse::failure(format!("{} not found", entity), None),
        ),
        ServiceError::PreconditionFailed(message) => {
            (StatusCode::CONFLICT, ApiResponse::failure(message, None))
        }
        ServiceError::Upload(e) => {
            tracing::error!("Upload error: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                ApiResponse::failure("Failed to upload picture", None),
            )
        }
        ServiceError::Generation(attempts) => {
            tracing::error!("Invite code generation exhausted {} attempts", attempts);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::failure("Failed to generate invite code", None),
            )
        }
        ServiceError::Persistence(e) => {
            tracing::error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::failure("Internal server error", None),
            )
        }
        ServiceError::Internal(e) => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::failure("Internal server error", None),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ServiceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn service_errors_map_to_statuses() {
        assert_eq!(
            status_of(ServiceError::validation("Missing required fields", &["name"])),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ServiceError::NotFound("NGO")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ServiceError::PreconditionFailed("no".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Generation(20)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn success_envelope_omits_empty_fields() {
        let Json(body) = ApiResponse::ok(vec![1, 2]);
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "data": [1, 2] }));
    }
}

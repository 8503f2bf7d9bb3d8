use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::api::{ApiError, AppState};
use crate::utils::hash_token;

/// Cookie read when no `Authorization` header is present. Browser
/// `EventSource` connections cannot set headers.
const ADMIN_TOKEN_COOKIE: &str = "admin_token";

/// Bearer token from `Authorization`, falling back to the admin cookie.
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .filter_map(|part| part.trim().strip_prefix(ADMIN_TOKEN_COOKIE)?.strip_prefix('='))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Rejects requests without the configured admin token. Passes everything
/// through when no token is configured.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token_hash.as_deref() else {
        return Ok(next.run(req).await);
    };

    let matches = extract_token(req.headers()).map(|token| hash_token(token) == expected);
    match matches {
        Some(true) => Ok(next.run(req).await),
        Some(false) => {
            tracing::warn!("Rejected request to {} with a wrong admin token", req.uri().path());
            Err(ApiError::Unauthorized)
        }
        None => Err(ApiError::Unauthorized),
    }
}

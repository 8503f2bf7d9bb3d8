use std::sync::Arc;

use axum::{Router, routing::get};

use crate::context::AppContext;
use crate::utils::hash_token;

pub mod dashboard;
pub mod events;
pub mod form;
pub mod health;
pub mod invite_codes;
pub mod ngos;
pub mod protests;
pub mod requests;
pub mod response;
pub mod routes;

pub use response::{ApiError, ApiResponse};

// ============================================
// Application State
// ============================================

#[derive(Clone)]
pub struct AppState {
    pub ctx: AppContext,
    /// SHA-256 of the admin bearer token. `None` disables the guard.
    pub admin_token_hash: Option<Arc<str>>,
}

impl AppState {
    pub fn new(ctx: AppContext, admin_token: Option<&str>) -> Self {
        Self {
            ctx,
            admin_token_hash: admin_token.map(|token| Arc::from(hash_token(token))),
        }
    }
}

/// Application router without transport layers (CORS, tracing, static
/// files); `main` adds those.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ping", get(health::ping))
        .nest("/v1", routes::v1_routes(state.clone()))
        .with_state(state)
}

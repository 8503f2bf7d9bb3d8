use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};

use super::AppState;
use super::{dashboard, events, invite_codes, ngos, protests, requests};
use crate::middleware::require_admin;

/// Largest accepted request body. Pictures travel inside multipart forms.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// V1 API routes
///
/// All routes require the admin bearer token when one is configured.
///
/// ## NGOs
/// - GET    /ngos - List verified NGOs
/// - POST   /ngos - Create NGO (multipart)
/// - GET    /ngos/{id} - Get NGO
/// - PUT    /ngos/{id} - Update NGO (multipart)
/// - DELETE /ngos/{id} - Delete NGO and its redeemed invite code
///
/// ## Verification requests
/// - GET  /requests - List open requests
/// - POST /requests/status - Change status, approving issues an invite code
///
/// ## Protests
/// - GET    /protests - List protests with organizer
/// - POST   /protests - Create protest (multipart)
/// - GET    /protests/{id} - Get protest
/// - PUT    /protests/{id} - Update protest (multipart)
/// - DELETE /protests/{id} - Delete protest
///
/// ## Invite codes
/// - GET    /invite-codes - List codes with redeeming orgs
/// - DELETE /invite-codes/{id} - Delete code
///
/// ## Dashboard
/// - GET /dashboard - Stats and recent activity
/// - GET /events - SSE stream of listing revalidations
pub fn v1_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // ========================================
        // NGOs
        // ========================================
        .route("/ngos", get(ngos::list_ngos).post(ngos::create_ngo))
        .route(
            "/ngos/{id}",
            get(ngos::get_ngo)
                .put(ngos::update_ngo)
                .delete(ngos::delete_ngo),
        )
        // ========================================
        // Verification requests
        // ========================================
        .route("/requests", get(requests::list_requests))
        .route("/requests/status", post(requests::update_request_status))
        // ========================================
        // Protests
        // ========================================
        .route(
            "/protests",
            get(protests::list_protests).post(protests::create_protest),
        )
        .route(
            "/protests/{id}",
            get(protests::get_protest)
                .put(protests::update_protest)
                .delete(protests::delete_protest),
        )
        // ========================================
        // Invite codes
        // ========================================
        .route("/invite-codes", get(invite_codes::list_invite_codes))
        .route("/invite-codes/{id}", delete(invite_codes::delete_invite_code))
        // ========================================
        // Dashboard
        // ========================================
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/events", get(events::revalidation_events))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

use axum::{Json, extract::State};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServiceStatus,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub database: bool,
    pub storage: StorageStatus,
}

#[derive(Serialize)]
pub struct StorageStatus {
    pub backend: &'static str,
    pub healthy: bool,
}

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}

/// Lightweight liveness probe for container healthchecks.
/// Returns 200 immediately without touching the database or bucket.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { status: "ok" })
}

/// Full health check: store ping and bucket reachability.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (database, storage_healthy) = tokio::join!(
        state.ctx.store.ping(),
        state.ctx.storage.is_healthy()
    );
    let database = database.is_ok();

    Json(HealthResponse {
        status: if database && storage_healthy {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        services: ServiceStatus {
            database,
            storage: StorageStatus {
                backend: state.ctx.storage.backend(),
                healthy: storage_healthy,
            },
        },
    })
}

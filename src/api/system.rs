//! Catalog status and health probes.
//!
//! These endpoints read the snapshot directly instead of going through
//! [`AppState::catalog`], so they keep answering while the catalog is failed.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiResponse, AppState, StatusResponse};

#[derive(Debug, Serialize)]
pub struct HealthLiveResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthReadyResponse {
    pub ready: bool,
    pub titles_loaded: bool,
    pub movies_loaded: bool,
    pub store_reachable: bool,
}

/// `GET /api/catalog/status`
///
/// Loading, ready or failed with the classified subscription error.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatusResponse>> {
    let snapshot = state.shared.catalog.snapshot();

    Json(ApiResponse::success(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        snapshot_version: snapshot.version,
        status: snapshot.status.clone(),
        titles: snapshot.titles.len(),
        movies: snapshot.movies.len(),
    }))
}

/// `GET /api/health/live`
pub async fn health_live() -> impl IntoResponse {
    Json(ApiResponse::success(HealthLiveResponse { status: "alive" }))
}

/// `GET /api/health/ready`
///
/// Ready once both collections delivered a snapshot, neither is failing and
/// the store answers its health probe.
pub async fn health_ready(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.shared.catalog.snapshot();
    let store_reachable = match state.shared.store.health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Store health probe failed");
            false
        }
    };
    let ready = snapshot.is_ready() && store_reachable;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ApiResponse::success(HealthReadyResponse {
            ready,
            titles_loaded: snapshot.titles_loaded,
            movies_loaded: snapshot.movies_loaded,
            store_reachable,
        })),
    )
        .into_response()
}

use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, HistoryRequest};
use crate::catalog::WatchHistory;

/// `POST /api/history`
///
/// The history lives with the client; this moves the watched title to the
/// front and returns the trimmed result for the client to store.
pub async fn record_watch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HistoryRequest>,
) -> Result<Json<ApiResponse<WatchHistory>>, ApiError> {
    let snapshot = state.catalog()?;
    if snapshot.title(&payload.watched).is_none() {
        return Err(ApiError::not_found("Title", &payload.watched));
    }

    let mut history = WatchHistory::from_ids(
        payload.history,
        state.config().catalog.watch_history_capacity,
    );
    history.record(payload.watched);

    Ok(Json(ApiResponse::success(history)))
}

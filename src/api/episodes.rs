use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::validate_window_days;
use super::{ApiError, ApiResponse, AppState};
use crate::catalog::{RecentEpisode, query};

#[derive(Debug, Default, Deserialize)]
pub struct NewEpisodesQuery {
    pub days: Option<u32>,
}

/// `GET /api/episodes/new?days=`
///
/// Episodes released within the window, newest first. The window defaults
/// to `catalog.new_episode_window_days`.
pub async fn new_episodes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NewEpisodesQuery>,
) -> Result<Json<ApiResponse<Vec<RecentEpisode>>>, ApiError> {
    let days = validate_window_days(
        params
            .days
            .unwrap_or(state.config().catalog.new_episode_window_days),
    )?;
    let snapshot = state.catalog()?;

    let recent = query::derive_new_episodes(&snapshot.titles, days, chrono::Utc::now());
    Ok(Json(ApiResponse::success(recent)))
}

//! Watch page endpoints.
//!
//! The server keeps no per-viewer state, so each request rebuilds a
//! [`SourceSelector`] from what the client reports: the provider used on the
//! previous episode, or the providers that already failed on this movie.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use super::validation::{parse_provider, parse_providers};
use super::{ApiError, ApiResponse, AppState, PlayerView, WatchEpisodeResponse, WatchMovieResponse};
use crate::catalog::query;
use crate::domain::{MovieId, TitleId};
use crate::player::{FailurePolicy, SourceSelector};

#[derive(Debug, Default, Deserialize)]
pub struct WatchEpisodeQuery {
    /// Provider the viewer picked on this page.
    pub source: Option<String>,
    /// Provider that was in use on the previously watched episode.
    pub previous: Option<String>,
}

/// `GET /api/watch/titles/{id}/{season}/{episode}?source=&previous=`
///
/// Load failures are not tracked on this page.
pub async fn watch_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season_number, episode_number)): Path<(String, u32, u32)>,
    Query(params): Query<WatchEpisodeQuery>,
) -> Result<Json<ApiResponse<WatchEpisodeResponse>>, ApiError> {
    let previous = params.previous.as_deref().map(parse_provider).transpose()?;
    let source = params.source.as_deref().map(parse_provider).transpose()?;

    let snapshot = state.catalog()?;
    let title = snapshot
        .title(&TitleId::new(id.as_str()))
        .ok_or_else(|| ApiError::not_found("Title", &id))?;
    let (season, episode) = query::find_episode(title, season_number, episode_number)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Episode S{season_number}E{episode_number} of {id} not found"
            ))
        })?;

    let player = &state.config().player;
    let now = Instant::now();
    let mut selector =
        SourceSelector::new(FailurePolicy::Ignore, player.load_timeout()).with_previous(previous);
    selector.enter(&episode.sources, now);
    if let Some(provider) = source {
        selector.select(provider, now)?;
    }

    let (previous, next) = query::episode_neighbours(title, &episode.id);

    Ok(Json(ApiResponse::success(WatchEpisodeResponse {
        title_id: title.id.clone(),
        title_name: title.name.clone(),
        season_id: season.id.clone(),
        season_number: season.number,
        player: PlayerView::from_sources(&selector, &player.embeds, &episode.sources),
        episode: episode.clone(),
        previous,
        next,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct WatchMovieQuery {
    pub source: Option<String>,
    /// Comma separated providers that already failed to load.
    pub failed: Option<String>,
}

/// `GET /api/watch/movies/{id}?source=&failed=a,b`
///
/// Reported failures are remembered. When the default provider is one of
/// them the page shows the retry hint; an explicit `source` always starts a
/// fresh load.
pub async fn watch_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<WatchMovieQuery>,
) -> Result<Json<ApiResponse<WatchMovieResponse>>, ApiError> {
    let source = params.source.as_deref().map(parse_provider).transpose()?;
    let failed = parse_providers(params.failed.as_deref())?;

    let snapshot = state.catalog()?;
    let movie = snapshot
        .movie(&MovieId::new(id.as_str()))
        .ok_or_else(|| ApiError::not_found("Movie", &id))?;

    let player = &state.config().player;
    let now = Instant::now();
    let mut selector = SourceSelector::new(FailurePolicy::Track, player.load_timeout());
    selector.enter(&movie.sources, now);
    for provider in &failed {
        selector.mark_failed(*provider);
    }

    match source {
        Some(provider) => {
            selector.select(provider, now)?;
        }
        None => {
            if selector
                .selected()
                .is_some_and(|selected| failed.contains(&selected))
            {
                selector.on_error();
            }
        }
    }

    Ok(Json(ApiResponse::success(WatchMovieResponse {
        player: PlayerView::from_sources(&selector, &player.embeds, &movie.sources),
        movie: movie.clone(),
    })))
}

//! Admin mutation endpoints. Every route here sits behind
//! [`super::auth::auth_middleware`].
//!
//! Handlers only translate between HTTP and the mutation services; the
//! catalog snapshot catches up through the store subscriptions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::{parse_flag, validate_season_number};
use super::{
    ApiError, ApiResponse, AppState, CreatedResponse, FlagToggleResponse, NewSeasonRequest,
    StatsResponse,
};
use crate::catalog::query;
use crate::domain::{EpisodeId, MovieId, SeasonId, TitleId};
use crate::models::{Episode, EpisodePatch, Movie, MoviePatch, NewEpisode, NewMovie, NewTitle, TitlePatch};

type Created = (StatusCode, Json<ApiResponse<CreatedResponse>>);

fn created(id: impl ToString) -> Created {
    (
        StatusCode::CREATED,
        Json(ApiResponse::success(CreatedResponse { id: id.to_string() })),
    )
}

/// `POST /api/admin/titles`
pub async fn create_title(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTitle>,
) -> Result<Created, ApiError> {
    let id = state.titles().create_title(payload).await?;
    Ok(created(id))
}

/// `PATCH /api/admin/titles/{id}`
pub async fn update_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<TitlePatch>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.titles().update_title(&TitleId::new(id), patch).await?;
    Ok(Json(ApiResponse::success(())))
}

/// `DELETE /api/admin/titles/{id}`
pub async fn delete_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.titles().delete_title(&TitleId::new(id)).await?;
    Ok(Json(ApiResponse::success(())))
}

/// `POST /api/admin/titles/{id}/flags/{flag}`
///
/// Flips the flag based on its stored value and returns the new value.
pub async fn toggle_flag(
    State(state): State<Arc<AppState>>,
    Path((id, flag)): Path<(String, String)>,
) -> Result<Json<ApiResponse<FlagToggleResponse>>, ApiError> {
    let flag = parse_flag(&flag)?;
    let id = TitleId::new(id);
    let value = state.titles().toggle_flag(&id, flag).await?;
    Ok(Json(ApiResponse::success(FlagToggleResponse { id, flag, value })))
}

/// `POST /api/admin/titles/{id}/seasons`
pub async fn add_season(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<NewSeasonRequest>,
) -> Result<Created, ApiError> {
    let number = validate_season_number(payload.number)?;
    let season_id = state.titles().add_season(&TitleId::new(id), number).await?;
    Ok(created(season_id))
}

/// `POST /api/admin/titles/{id}/seasons/{season_id}/episodes`
pub async fn add_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season_id)): Path<(String, String)>,
    Json(payload): Json<NewEpisode>,
) -> Result<Created, ApiError> {
    let episode_id = state
        .titles()
        .add_episode(&TitleId::new(id), &SeasonId::new(season_id), payload)
        .await?;
    Ok(created(episode_id))
}

/// `PATCH /api/admin/titles/{id}/seasons/{season_id}/episodes/{episode_id}`
pub async fn update_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season_id, episode_id)): Path<(String, String, String)>,
    Json(patch): Json<EpisodePatch>,
) -> Result<Json<ApiResponse<Episode>>, ApiError> {
    let episode = state
        .titles()
        .update_episode(
            &TitleId::new(id),
            &SeasonId::new(season_id),
            &EpisodeId::new(episode_id),
            patch,
        )
        .await?;
    Ok(Json(ApiResponse::success(episode)))
}

/// `DELETE /api/admin/titles/{id}/seasons/{season_id}/episodes/{episode_id}`
pub async fn delete_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season_id, episode_id)): Path<(String, String, String)>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .titles()
        .delete_episode(
            &TitleId::new(id),
            &SeasonId::new(season_id),
            &EpisodeId::new(episode_id),
        )
        .await?;
    Ok(Json(ApiResponse::success(())))
}

/// `POST /api/admin/movies`
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewMovie>,
) -> Result<Created, ApiError> {
    let id = state.movies().create_movie(payload).await?;
    Ok(created(id))
}

/// `PATCH /api/admin/movies/{id}`
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<MoviePatch>,
) -> Result<Json<ApiResponse<Movie>>, ApiError> {
    let movie = state.movies().update_movie(&MovieId::new(id), patch).await?;
    Ok(Json(ApiResponse::success(movie)))
}

/// `DELETE /api/admin/movies/{id}`
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.movies().delete_movie(&MovieId::new(id)).await?;
    Ok(Json(ApiResponse::success(())))
}

/// `GET /api/admin/stats`
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsResponse>>, ApiError> {
    let snapshot = state.catalog()?;
    let titles = &snapshot.titles;

    Ok(Json(ApiResponse::success(StatsResponse {
        titles: titles.len(),
        movies: snapshot.movies.len(),
        seasons: titles.iter().map(|t| t.seasons.len()).sum(),
        episodes: titles.iter().map(query::total_episodes).sum(),
        categories: query::categories(titles).len(),
        sections: query::section_counts(titles),
        view_cache: state.shared.views.stats(),
    })))
}

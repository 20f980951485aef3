use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::domain::MovieId;
use crate::models::Movie;

/// `GET /api/movies`
///
/// Newest release first.
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Movie>>>, ApiError> {
    let snapshot = state.catalog()?;
    Ok(Json(ApiResponse::success(snapshot.movies.as_ref().clone())))
}

/// `GET /api/movies/{id}`
pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Movie>>, ApiError> {
    let snapshot = state.catalog()?;
    let movie = snapshot
        .movie(&MovieId::new(id.as_str()))
        .ok_or_else(|| ApiError::not_found("Movie", &id))?;
    Ok(Json(ApiResponse::success(movie.clone())))
}

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{parse_id_list, parse_section, parse_sort, validate_limit};
use super::{ApiError, ApiResponse, AppState, TitleDetail};
use crate::catalog::{Recommendation, TitleQuery, WatchHistory, query};
use crate::domain::TitleId;
use crate::models::Title;

#[derive(Debug, Default, Deserialize)]
pub struct ListTitlesQuery {
    pub q: Option<String>,
    pub section: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListTitlesQuery {
    fn into_query(self) -> Result<TitleQuery, ApiError> {
        Ok(TitleQuery {
            sort: parse_sort(self.sort.as_deref(), self.order.as_deref())?,
            section: parse_section(self.section.as_deref())?,
            search: self.q,
            category: self.category,
        })
    }
}

/// `GET /api/titles?q=&section=&category=&sort=&order=`
///
/// Search runs first, then the section and category filters, then sorting.
/// Results are memoized per snapshot version.
pub async fn list_titles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTitlesQuery>,
) -> Result<Json<ApiResponse<Vec<Title>>>, ApiError> {
    let query = params.into_query()?;
    let snapshot = state.catalog()?;

    let listing = state
        .shared
        .views
        .listing(snapshot.version, &query, || query.apply(&snapshot.titles));

    Ok(Json(ApiResponse::success(listing.as_ref().clone())))
}

/// `GET /api/titles/trending`
pub async fn trending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Title>>>, ApiError> {
    let snapshot = state.catalog()?;
    Ok(Json(ApiResponse::success(snapshot.trending.as_ref().clone())))
}

/// `GET /api/titles/season-trending`
pub async fn season_trending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Title>>>, ApiError> {
    let snapshot = state.catalog()?;
    Ok(Json(ApiResponse::success(query::season_trending(
        &snapshot.titles,
    ))))
}

/// `GET /api/titles/categories`
pub async fn categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let snapshot = state.catalog()?;
    Ok(Json(ApiResponse::success(query::categories(
        &snapshot.titles,
    ))))
}

/// `GET /api/titles/{id}`
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TitleDetail>>, ApiError> {
    let snapshot = state.catalog()?;
    let title = snapshot
        .title(&TitleId::new(id.as_str()))
        .ok_or_else(|| ApiError::not_found("Title", &id))?;

    Ok(Json(ApiResponse::success(TitleDetail::from(title.clone()))))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationsQuery {
    /// Comma separated title ids, most recently watched first.
    pub history: Option<String>,
    pub limit: Option<usize>,
}

/// `GET /api/titles/{id}/recommendations?history=a,b&limit=`
pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<RecommendationsQuery>,
) -> Result<Json<ApiResponse<Vec<Recommendation>>>, ApiError> {
    let settings = &state.config().catalog;
    let limit = params
        .limit
        .map_or(Ok(settings.recommendation_limit), validate_limit)?;

    let snapshot = state.catalog()?;
    let anchor = snapshot
        .title(&TitleId::new(id.as_str()))
        .ok_or_else(|| ApiError::not_found("Title", &id))?;

    let history = WatchHistory::from_ids(
        parse_id_list(params.history.as_deref())
            .into_iter()
            .map(TitleId::from),
        settings.watch_history_capacity,
    );

    let ranked = query::recommend(
        anchor,
        &snapshot.titles,
        &history,
        limit,
        settings.strong_match_threshold,
    );
    Ok(Json(ApiResponse::success(ranked)))
}

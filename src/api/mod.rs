use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::{CatalogSnapshot, CatalogStatus};
use crate::config::Config;
use crate::state::SharedState;

mod admin;
pub mod auth;
mod episodes;
mod error;
pub mod events;
mod history;
mod movies;
mod observability;
mod system;
mod titles;
mod types;
mod validation;
mod watch;

pub use error::ApiError;
pub use types::*;

use crate::domain::events::CatalogEvent;
use crate::services::{MovieService, TitleService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn event_bus(&self) -> &tokio::sync::broadcast::Sender<CatalogEvent> {
        &self.shared.event_bus
    }

    #[must_use]
    pub fn titles(&self) -> &Arc<dyn TitleService> {
        &self.shared.title_service
    }

    #[must_use]
    pub fn movies(&self) -> &Arc<dyn MovieService> {
        &self.shared.movie_service
    }

    /// Current catalog snapshot, or the classified subscription error while
    /// the catalog is failed.
    pub fn catalog(&self) -> Result<Arc<CatalogSnapshot>, ApiError> {
        let snapshot = self.shared.catalog.snapshot();
        if let CatalogStatus::Failed { kind, message, .. } = &snapshot.status {
            return Err(ApiError::CatalogUnavailable {
                kind: *kind,
                message: message.clone(),
            });
        }
        Ok(snapshot)
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let admin_routes = create_admin_router(Arc::clone(&state));

    let api_router = Router::new()
        .route("/titles", get(titles::list_titles))
        .route("/titles/trending", get(titles::trending))
        .route("/titles/season-trending", get(titles::season_trending))
        .route("/titles/categories", get(titles::categories))
        .route("/titles/{id}", get(titles::get_title))
        .route(
            "/titles/{id}/recommendations",
            get(titles::recommendations),
        )
        .route("/episodes/new", get(episodes::new_episodes))
        .route("/movies", get(movies::list_movies))
        .route("/movies/{id}", get(movies::get_movie))
        .route(
            "/watch/titles/{id}/{season}/{episode}",
            get(watch::watch_episode),
        )
        .route("/watch/movies/{id}", get(watch::watch_movie))
        .route("/history", post(history::record_watch))
        .route("/catalog/status", get(system::get_status))
        .route("/health/live", get(system::health_live))
        .route("/health/ready", get(system::health_ready))
        .merge(events::router())
        .nest("/admin", admin_routes)
        .with_state(Arc::clone(&state));

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(auth::session))
        .route("/titles", post(admin::create_title))
        .route(
            "/titles/{id}",
            patch(admin::update_title).delete(admin::delete_title),
        )
        .route("/titles/{id}/flags/{flag}", post(admin::toggle_flag))
        .route("/titles/{id}/seasons", post(admin::add_season))
        .route(
            "/titles/{id}/seasons/{season_id}/episodes",
            post(admin::add_episode),
        )
        .route(
            "/titles/{id}/seasons/{season_id}/episodes/{episode_id}",
            patch(admin::update_episode).delete(admin::delete_episode),
        )
        .route("/movies", post(admin::create_movie))
        .route(
            "/movies/{id}",
            patch(admin::update_movie).delete(admin::delete_movie),
        )
        .route("/stats", get(admin::get_stats))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

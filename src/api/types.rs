use serde::{Deserialize, Serialize};
use url::Url;

use crate::catalog::query::{EpisodeRef, SectionCount};
use crate::catalog::views::CacheStats;
use crate::catalog::CatalogStatus;
use crate::domain::{SeasonId, TitleId};
use crate::models::{Episode, Movie, Title, TitleFlag, VideoProvider};
use crate::player::{EmbedTemplates, PlaybackState, SourceSelector};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Input field a validation error refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            field: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            field: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct TitleDetail {
    #[serde(flatten)]
    pub title: Title,
    pub total_episodes: usize,
}

impl From<Title> for TitleDetail {
    fn from(title: Title) -> Self {
        let total_episodes = title.total_episodes();
        Self {
            title,
            total_episodes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmbedDto {
    pub provider: VideoProvider,
    pub label: &'static str,
    pub url: String,
}

/// Source selection state shared by both watch pages.
#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub playback: PlaybackState,
    pub selected: Option<VideoProvider>,
    pub available: Vec<VideoProvider>,
    pub failed: Vec<VideoProvider>,
    /// Iframe URL of the selected provider.
    pub embed_url: Option<String>,
    pub embeds: Vec<EmbedDto>,
}

impl PlayerView {
    #[must_use]
    pub fn new(selector: &SourceSelector, embeds: Vec<(VideoProvider, Url)>) -> Self {
        let embed_url = selector.selected().and_then(|selected| {
            embeds
                .iter()
                .find(|(provider, _)| *provider == selected)
                .map(|(_, url)| url.to_string())
        });

        Self {
            playback: selector.state().clone(),
            selected: selector.selected(),
            available: selector.available().to_vec(),
            failed: selector.failed().to_vec(),
            embed_url,
            embeds: embeds
                .into_iter()
                .map(|(provider, url)| EmbedDto {
                    provider,
                    label: provider.label(),
                    url: url.to_string(),
                })
                .collect(),
        }
    }

    /// Builds the view from the embeds of a source set.
    pub fn from_sources<S: crate::models::SourceSet>(
        selector: &SourceSelector,
        templates: &EmbedTemplates,
        sources: &S,
    ) -> Self {
        Self::new(selector, templates.embeds(sources))
    }
}

#[derive(Debug, Serialize)]
pub struct WatchEpisodeResponse {
    pub title_id: TitleId,
    pub title_name: String,
    pub season_id: SeasonId,
    pub season_number: u32,
    pub episode: Episode,
    pub previous: Option<EpisodeRef>,
    pub next: Option<EpisodeRef>,
    #[serde(flatten)]
    pub player: PlayerView,
}

#[derive(Debug, Serialize)]
pub struct WatchMovieResponse {
    pub movie: Movie,
    #[serde(flatten)]
    pub player: PlayerView,
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    #[serde(default)]
    pub history: Vec<TitleId>,
    pub watched: TitleId,
}

#[derive(Debug, Deserialize)]
pub struct NewSeasonRequest {
    pub number: u32,
}

#[derive(Debug, Serialize)]
pub struct FlagToggleResponse {
    pub id: TitleId,
    pub flag: TitleFlag,
    pub value: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub admin: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime: u64,
    pub snapshot_version: u64,
    pub status: CatalogStatus,
    pub titles: usize,
    pub movies: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub titles: usize,
    pub movies: usize,
    pub seasons: usize,
    pub episodes: usize,
    pub categories: usize,
    pub sections: Vec<SectionCount>,
    pub view_cache: CacheStats,
}

//! Domain service for title, season and episode mutations.
//!
//! This module provides the [`TitleService`] trait and the [`CatalogError`]
//! taxonomy shared by every mutation service.

use thiserror::Error;

use crate::domain::{EpisodeId, MovieId, SeasonId, TitleId};
use crate::models::{
    Episode, EpisodePatch, FieldError, NewEpisode, NewTitle, Title, TitleFlag, TitlePatch,
};
use crate::remote::StoreError;

/// Errors returned by the mutation services.
///
/// Validation and duplicate-number failures are raised before anything is
/// sent to the store; [`CatalogError::field`] names the offending input.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Title {0} not found")]
    TitleNotFound(TitleId),

    #[error("Season {0} not found")]
    SeasonNotFound(SeasonId),

    #[error("Episode {0} not found")]
    EpisodeNotFound(EpisodeId),

    #[error("Movie {0} not found")]
    MovieNotFound(MovieId),

    #[error("Season {number} already exists")]
    DuplicateSeason { number: u32 },

    #[error("Episode {number} already exists in this season")]
    DuplicateEpisode { number: u32 },

    #[error("Validation error: {0}")]
    Validation(#[from] FieldError),

    #[error("Failed to create: {0}")]
    CreateFailed(StoreError),

    #[error("Failed to read: {0}")]
    ReadFailed(StoreError),

    #[error("Failed to update: {0}")]
    UpdateFailed(StoreError),

    #[error("Failed to delete: {0}")]
    DeleteFailed(StoreError),

    #[error("{id} was modified concurrently; gave up after {attempts} attempts")]
    Conflict { id: String, attempts: u32 },
}

impl CatalogError {
    /// Input field a local validation failure belongs to.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation(err) => Some(err.field),
            Self::DuplicateSeason { .. } => Some("season_number"),
            Self::DuplicateEpisode { .. } => Some("episode_number"),
            _ => None,
        }
    }

    /// True for failures detected without contacting the store.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::DuplicateSeason { .. } | Self::DuplicateEpisode { .. }
        )
    }

    /// Label used for the `outcome` metric dimension.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::TitleNotFound(_)
            | Self::SeasonNotFound(_)
            | Self::EpisodeNotFound(_)
            | Self::MovieNotFound(_) => "not_found",
            Self::DuplicateSeason { .. } | Self::DuplicateEpisode { .. } => "duplicate",
            Self::Validation(_) => "invalid",
            Self::Conflict { .. } => "conflict",
            Self::CreateFailed(_)
            | Self::ReadFailed(_)
            | Self::UpdateFailed(_)
            | Self::DeleteFailed(_) => "store_error",
        }
    }
}

/// Domain service trait for catalog title mutations.
///
/// Seasons and episodes live inside their title's document, so every nested
/// mutation is a read-modify-write of the title's `seasons` array guarded by
/// the document version.
#[async_trait::async_trait]
pub trait TitleService: Send + Sync {
    /// Creates a title with no seasons.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::Validation`] for a blank name or an out of
    ///   range rating
    /// - Returns [`CatalogError::CreateFailed`] on store failures
    async fn create_title(&self, input: NewTitle) -> Result<TitleId, CatalogError>;

    /// Reads a title directly from the store.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::TitleNotFound`] if the title does not exist
    async fn get_title(&self, id: &TitleId) -> Result<Title, CatalogError>;

    /// Merges the present fields of `patch` into the title.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::Validation`] for an invalid rating or name
    /// - Returns [`CatalogError::UpdateFailed`] on store failures
    async fn update_title(&self, id: &TitleId, patch: TitlePatch) -> Result<(), CatalogError>;

    /// Deletes the title together with its seasons and episodes.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::TitleNotFound`] if nothing was deleted
    async fn delete_title(&self, id: &TitleId) -> Result<(), CatalogError>;

    /// Appends a season, keeping seasons ordered by number.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::DuplicateSeason`] if the number is taken;
    ///   nothing is written in that case
    async fn add_season(&self, title_id: &TitleId, number: u32)
    -> Result<SeasonId, CatalogError>;

    /// Adds an episode to a season. New episodes start flagged as new.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::Validation`] when no source is given
    /// - Returns [`CatalogError::DuplicateEpisode`] if the number is taken
    /// - Returns [`CatalogError::SeasonNotFound`] for an unknown season
    async fn add_episode(
        &self,
        title_id: &TitleId,
        season_id: &SeasonId,
        input: NewEpisode,
    ) -> Result<EpisodeId, CatalogError>;

    /// Edits an episode in place.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::DuplicateEpisode`] when renumbering onto an
    ///   existing episode
    async fn update_episode(
        &self,
        title_id: &TitleId,
        season_id: &SeasonId,
        episode_id: &EpisodeId,
        patch: EpisodePatch,
    ) -> Result<Episode, CatalogError>;

    /// # Errors
    ///
    /// - Returns [`CatalogError::EpisodeNotFound`] for an unknown episode
    async fn delete_episode(
        &self,
        title_id: &TitleId,
        season_id: &SeasonId,
        episode_id: &EpisodeId,
    ) -> Result<(), CatalogError>;

    /// Negates a flag based on the stored value and returns the new value.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::Conflict`] if the title kept changing
    ///   underneath every retry
    async fn toggle_flag(&self, title_id: &TitleId, flag: TitleFlag)
    -> Result<bool, CatalogError>;
}

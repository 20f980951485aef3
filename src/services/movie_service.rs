//! Domain service for standalone movies.

use super::title_service::CatalogError;
use crate::domain::MovieId;
use crate::models::{Movie, MoviePatch, NewMovie};

#[async_trait::async_trait]
pub trait MovieService: Send + Sync {
    /// # Errors
    ///
    /// - Returns [`CatalogError::Validation`] for a blank title or no source
    /// - Returns [`CatalogError::CreateFailed`] on store failures
    async fn create_movie(&self, input: NewMovie) -> Result<MovieId, CatalogError>;

    /// # Errors
    ///
    /// - Returns [`CatalogError::MovieNotFound`] if the movie does not exist
    async fn get_movie(&self, id: &MovieId) -> Result<Movie, CatalogError>;

    /// One-shot listing, newest release first.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::ReadFailed`] on store failures
    async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError>;

    /// Merges the present fields of `patch`. Sources merge per provider.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::MovieNotFound`] if the movie does not exist
    async fn update_movie(&self, id: &MovieId, patch: MoviePatch) -> Result<Movie, CatalogError>;

    /// # Errors
    ///
    /// - Returns [`CatalogError::MovieNotFound`] if nothing was deleted
    async fn delete_movie(&self, id: &MovieId) -> Result<(), CatalogError>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FieldError;
use super::sources::{MovieSources, SourceSet};
use crate::domain::MovieId;

/// Standalone single-video entry, not nested under a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub sources: MovieSources,
    #[serde(default)]
    pub is_new: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
    pub title: String,
    #[serde(default)]
    pub synopsis: String,
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub sources: MovieSources,
    #[serde(default = "default_true")]
    pub is_new: bool,
}

const fn default_true() -> bool {
    true
}

impl NewMovie {
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.title.trim().is_empty() {
            return Err(FieldError::new("title", "Title cannot be empty"));
        }
        if !self.sources.has_any() {
            return Err(FieldError::new(
                "sources",
                "At least one video source is required",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn into_movie(self, id: MovieId) -> Movie {
        Movie {
            id,
            title: self.title.trim().to_string(),
            synopsis: self.synopsis,
            release_date: self.release_date,
            duration: self.duration,
            genres: self.genres,
            thumbnail: self.thumbnail,
            sources: self.sources,
            is_new: self.is_new,
        }
    }
}

/// Partial update of a movie. Absent fields are never written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoviePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<MovieSources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
}

impl MoviePatch {
    pub fn validate(&self) -> Result<(), FieldError> {
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(FieldError::new("title", "Title cannot be empty"));
        }
        Ok(())
    }
}

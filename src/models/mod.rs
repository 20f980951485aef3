pub mod episode;
pub mod movie;
pub mod sources;
pub mod title;

pub use episode::{Episode, EpisodePatch, NewEpisode};
pub use movie::{Movie, MoviePatch, NewMovie};
pub use sources::{EpisodeSources, MovieSources, SourceSet, VideoProvider};
pub use title::{NewTitle, Season, Title, TitleFlag, TitleFlags, TitlePatch};

use std::fmt;

/// A validation failure attached to one input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FieldError;
use super::sources::{EpisodeSources, SourceSet};
use crate::domain::EpisodeId;

/// A single playable episode inside a season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub title: String,
    pub number: u32,
    #[serde(default)]
    pub sources: EpisodeSources,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub duration: String,
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub is_new: bool,
}

/// Fields accepted when adding an episode.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEpisode {
    pub title: String,
    pub number: u32,
    #[serde(default)]
    pub sources: EpisodeSources,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub duration: String,
    pub release_date: DateTime<Utc>,
}

impl NewEpisode {
    pub fn validate(&self) -> Result<(), FieldError> {
        if !self.sources.has_any() {
            return Err(FieldError::new(
                "sources",
                "At least one video source is required",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn into_episode(self, id: EpisodeId) -> Episode {
        Episode {
            id,
            title: self.title,
            number: self.number,
            sources: self.sources,
            thumbnail: self.thumbnail,
            duration: self.duration,
            release_date: self.release_date,
            is_new: true,
        }
    }
}

/// Partial update of an episode. Sources are merged per provider; an empty
/// string clears a provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EpisodePatch {
    pub title: Option<String>,
    pub number: Option<u32>,
    pub sources: Option<EpisodeSources>,
    pub thumbnail: Option<String>,
    pub duration: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub is_new: Option<bool>,
}

impl EpisodePatch {
    pub fn apply(&self, episode: &mut Episode) {
        if let Some(title) = &self.title {
            episode.title.clone_from(title);
        }
        if let Some(number) = self.number {
            episode.number = number;
        }
        if let Some(sources) = &self.sources {
            episode.sources.merge(sources);
        }
        if let Some(thumbnail) = &self.thumbnail {
            episode.thumbnail.clone_from(thumbnail);
        }
        if let Some(duration) = &self.duration {
            episode.duration.clone_from(duration);
        }
        if let Some(release_date) = self.release_date {
            episode.release_date = release_date;
        }
        if let Some(is_new) = self.is_new {
            episode.is_new = is_new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_episode(sources: EpisodeSources) -> NewEpisode {
        NewEpisode {
            title: "Pilot".to_string(),
            number: 1,
            sources,
            thumbnail: String::new(),
            duration: "24m".to_string(),
            release_date: Utc::now(),
        }
    }

    #[test]
    fn creation_requires_a_source() {
        let err = new_episode(EpisodeSources::default())
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "sources");

        let ok = new_episode(EpisodeSources {
            mega: Some("abc".to_string()),
            ..Default::default()
        });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn new_episodes_are_flagged_new() {
        let episode = new_episode(EpisodeSources {
            mega: Some("abc".to_string()),
            ..Default::default()
        })
        .into_episode(EpisodeId::new("e1"));
        assert!(episode.is_new);
    }

    #[test]
    fn patch_can_clear_every_source() {
        let mut episode = new_episode(EpisodeSources {
            mega: Some("abc".to_string()),
            ..Default::default()
        })
        .into_episode(EpisodeId::new("e1"));

        EpisodePatch {
            sources: Some(EpisodeSources {
                mega: Some(String::new()),
                ..Default::default()
            }),
            is_new: Some(false),
            ..Default::default()
        }
        .apply(&mut episode);

        assert!(!episode.sources.has_any());
        assert!(!episode.is_new);
        assert_eq!(episode.title, "Pilot");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::FieldError;
use super::episode::Episode;
use crate::domain::{SeasonId, TitleId};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;

/// A series-like catalog entry owning its seasons and episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,
    pub name: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub category: String,
    #[serde(flatten)]
    pub flags: TitleFlags,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub seasons: Vec<Season>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Title {
    #[must_use]
    pub fn season(&self, id: &SeasonId) -> Option<&Season> {
        self.seasons.iter().find(|s| &s.id == id)
    }

    #[must_use]
    pub fn season_by_number(&self, number: u32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.number == number)
    }

    pub fn season_mut(&mut self, id: &SeasonId) -> Option<&mut Season> {
        self.seasons.iter_mut().find(|s| &s.id == id)
    }

    #[must_use]
    pub fn total_episodes(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }
}

/// Curated boolean markers toggled from the admin panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleFlags {
    pub trending: bool,
    pub season_trending: bool,
    pub is_hindi_dub: bool,
    pub is_telugu_dub: bool,
    pub is_new_episode: bool,
    pub is_movie: bool,
}

impl TitleFlags {
    #[must_use]
    pub const fn get(&self, flag: TitleFlag) -> bool {
        match flag {
            TitleFlag::Trending => self.trending,
            TitleFlag::SeasonTrending => self.season_trending,
            TitleFlag::HindiDub => self.is_hindi_dub,
            TitleFlag::TeluguDub => self.is_telugu_dub,
            TitleFlag::NewEpisode => self.is_new_episode,
            TitleFlag::Movie => self.is_movie,
        }
    }
}

/// Names a single [`TitleFlags`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleFlag {
    Trending,
    SeasonTrending,
    HindiDub,
    TeluguDub,
    NewEpisode,
    Movie,
}

impl TitleFlag {
    pub const ALL: [Self; 6] = [
        Self::Trending,
        Self::SeasonTrending,
        Self::HindiDub,
        Self::TeluguDub,
        Self::NewEpisode,
        Self::Movie,
    ];

    /// Document field holding this flag.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Trending => "trending",
            Self::SeasonTrending => "season_trending",
            Self::HindiDub => "is_hindi_dub",
            Self::TeluguDub => "is_telugu_dub",
            Self::NewEpisode => "is_new_episode",
            Self::Movie => "is_movie",
        }
    }
}

impl fmt::Display for TitleFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for TitleFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|flag| {
                flag.field() == key || flag.field().strip_prefix("is_") == Some(key.as_str())
            })
            .ok_or_else(|| format!("unknown flag '{s}'"))
    }
}

/// A numbered season; `number` is unique within its title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub number: u32,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

/// Fields accepted when creating a title.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTitle {
    pub name: String,
    pub synopsis: String,
    pub cover_image: String,
    pub category: String,
    pub rating: f64,
    #[serde(flatten)]
    pub flags: TitleFlags,
}

impl NewTitle {
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.name.trim().is_empty() {
            return Err(FieldError::new("name", "Name cannot be empty"));
        }
        validate_rating(self.rating)
    }

    #[must_use]
    pub fn into_title(self, id: TitleId, now: DateTime<Utc>) -> Title {
        Title {
            id,
            name: self.name.trim().to_string(),
            synopsis: self.synopsis,
            cover_image: self.cover_image,
            category: self.category,
            flags: self.flags,
            rating: self.rating,
            seasons: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a title. Absent fields are never written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitlePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_trending: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hindi_dub: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_telugu_dub: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_episode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_movie: Option<bool>,
}

impl TitlePatch {
    pub fn validate(&self) -> Result<(), FieldError> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(FieldError::new("name", "Name cannot be empty"));
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        Ok(())
    }
}

pub fn validate_rating(rating: f64) -> Result<(), FieldError> {
    if rating.is_nan() || !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(FieldError::new(
            "rating",
            format!("Rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_flattened_into_the_document() {
        let title = NewTitle {
            name: "Frieren".to_string(),
            flags: TitleFlags {
                trending: true,
                ..Default::default()
            },
            ..Default::default()
        }
        .into_title(TitleId::new("t1"), Utc::now());

        let value = serde_json::to_value(&title).unwrap();
        assert_eq!(value["trending"], serde_json::json!(true));
        assert_eq!(value["is_movie"], serde_json::json!(false));
        assert!(value.get("flags").is_none());
    }

    #[test]
    fn patch_omits_absent_fields() {
        let patch = TitlePatch {
            rating: Some(7.5),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "rating": 7.5 }));
    }

    #[test]
    fn rating_bounds_are_inclusive() {
        assert!(validate_rating(0.0).is_ok());
        assert!(validate_rating(10.0).is_ok());
        assert!(validate_rating(10.01).is_err());
        assert!(validate_rating(-0.5).is_err());
        assert!(validate_rating(f64::NAN).is_err());
    }

    #[test]
    fn blank_names_are_rejected() {
        let err = NewTitle {
            name: "  ".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn flag_names_parse() {
        assert_eq!("trending".parse(), Ok(TitleFlag::Trending));
        assert_eq!("season-trending".parse(), Ok(TitleFlag::SeasonTrending));
        assert_eq!("is_hindi_dub".parse(), Ok(TitleFlag::HindiDub));
        assert_eq!("telugu_dub".parse(), Ok(TitleFlag::TeluguDub));
        assert_eq!("new_episode".parse(), Ok(TitleFlag::NewEpisode));
        assert_eq!("movie".parse(), Ok(TitleFlag::Movie));
        assert!("popular".parse::<TitleFlag>().is_err());
    }
}

//! Domain primitives for the catalog.
//!
//! Identifiers are opaque strings assigned by the document store. Each entity
//! gets its own newtype so a season id can never be passed where a title id
//! is expected.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a [`crate::models::Title`].
    ///
    /// ```rust
    /// use anicatalog::domain::TitleId;
    ///
    /// let id = TitleId::new("naruto");
    /// assert_eq!(id.as_str(), "naruto");
    /// assert_eq!(id.to_string(), "naruto");
    /// ```
    TitleId
);
string_id!(
    /// Identifier of a season, unique within the whole catalog.
    SeasonId
);
string_id!(
    /// Identifier of an episode, unique within the whole catalog.
    EpisodeId
);
string_id!(
    /// Identifier of a standalone [`crate::models::Movie`].
    MovieId
);

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn is_ascending(&self) -> bool {
        matches!(self, Self::Asc)
    }

    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(format!("unknown sort order '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_transparent_in_json() {
        let id = TitleId::new("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: TitleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(EpisodeId::generate(), EpisodeId::generate());
    }

    #[test]
    fn default_ids_are_empty() {
        assert_eq!(TitleId::default().as_str(), "");
        assert_eq!(MovieId::default().as_str(), "");
    }

    #[test]
    fn sort_order_parses_both_spellings() {
        let asc: SortOrder = serde_json::from_str("\"asc\"").unwrap();
        let desc: SortOrder = serde_json::from_str("\"descending\"").unwrap();
        assert!(asc.is_ascending());
        assert_eq!(desc, SortOrder::Desc);
        assert_eq!(desc.reversed(), SortOrder::Asc);
    }
}

//! Events broadcast to connected clients whenever the catalog changes.

use serde::Serialize;

use crate::catalog::SubscriptionErrorKind;

/// Sent over the event bus and streamed to clients via SSE.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum CatalogEvent {
    TitlesUpdated {
        version: u64,
        count: usize,
    },
    MoviesUpdated {
        version: u64,
        count: usize,
    },

    TitleCreated {
        id: String,
        name: String,
    },
    TitleUpdated {
        id: String,
    },
    TitleDeleted {
        id: String,
    },

    SeasonAdded {
        title_id: String,
        number: u32,
    },
    EpisodeAdded {
        title_id: String,
        season_id: String,
        number: u32,
    },
    EpisodeUpdated {
        title_id: String,
        episode_id: String,
    },
    EpisodeDeleted {
        title_id: String,
        episode_id: String,
    },

    FlagToggled {
        title_id: String,
        flag: String,
        value: bool,
    },

    MovieCreated {
        id: String,
        title: String,
    },
    MovieUpdated {
        id: String,
    },
    MovieDeleted {
        id: String,
    },

    SampleTitlesPurged {
        count: usize,
    },

    SubscriptionFailed {
        collection: String,
        kind: SubscriptionErrorKind,
        message: String,
    },
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Embeddable video hosts, declared in playback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoProvider {
    StreamHg,
    DoodStream,
    MegaCloud,
    Mega,
    Streamtape,
}

impl VideoProvider {
    /// Fixed fallback order used when entering a watch page.
    pub const PRIORITY: [Self; 5] = [
        Self::StreamHg,
        Self::DoodStream,
        Self::MegaCloud,
        Self::Mega,
        Self::Streamtape,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::StreamHg => "stream_hg",
            Self::DoodStream => "dood_stream",
            Self::MegaCloud => "mega_cloud",
            Self::Mega => "mega",
            Self::Streamtape => "streamtape",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StreamHg => "StreamHG",
            Self::DoodStream => "DoodStream",
            Self::MegaCloud => "MegaCloud",
            Self::Mega => "Mega",
            Self::Streamtape => "Streamtape",
        }
    }
}

impl fmt::Display for VideoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VideoProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "streamhg" => Ok(Self::StreamHg),
            "doodstream" | "dood" => Ok(Self::DoodStream),
            "megacloud" => Ok(Self::MegaCloud),
            "mega" => Ok(Self::Mega),
            "streamtape" => Ok(Self::Streamtape),
            _ => Err(format!("unknown video source '{s}'")),
        }
    }
}

/// Anything that carries per-provider video identifiers.
pub trait SourceSet {
    /// Providers this kind of record can carry, in priority order.
    fn providers(&self) -> &'static [VideoProvider];

    /// Raw identifier stored for a provider, if any.
    fn raw(&self, provider: VideoProvider) -> Option<&str>;

    /// Identifier for a provider, ignoring blank values.
    fn source(&self, provider: VideoProvider) -> Option<&str> {
        self.raw(provider)
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Populated providers in priority order.
    fn available(&self) -> Vec<VideoProvider> {
        self.providers()
            .iter()
            .copied()
            .filter(|p| self.source(*p).is_some())
            .collect()
    }

    fn has_any(&self) -> bool {
        self.providers().iter().any(|p| self.source(*p).is_some())
    }
}

/// Video identifiers of an episode. All five hosts are supported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeSources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_hg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dood_stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mega_cloud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mega: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streamtape: Option<String>,
}

impl EpisodeSources {
    /// Overwrites every field that is present in `patch`. An empty string
    /// clears the source.
    pub fn merge(&mut self, patch: &Self) {
        apply(&mut self.stream_hg, patch.stream_hg.as_ref());
        apply(&mut self.dood_stream, patch.dood_stream.as_ref());
        apply(&mut self.mega_cloud, patch.mega_cloud.as_ref());
        apply(&mut self.mega, patch.mega.as_ref());
        apply(&mut self.streamtape, patch.streamtape.as_ref());
    }
}

impl SourceSet for EpisodeSources {
    fn providers(&self) -> &'static [VideoProvider] {
        &VideoProvider::PRIORITY
    }

    fn raw(&self, provider: VideoProvider) -> Option<&str> {
        match provider {
            VideoProvider::StreamHg => self.stream_hg.as_deref(),
            VideoProvider::DoodStream => self.dood_stream.as_deref(),
            VideoProvider::MegaCloud => self.mega_cloud.as_deref(),
            VideoProvider::Mega => self.mega.as_deref(),
            VideoProvider::Streamtape => self.streamtape.as_deref(),
        }
    }
}

/// Video identifiers of a movie. Mega is not offered for movies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieSources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_hg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dood_stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mega_cloud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streamtape: Option<String>,
}

impl MovieSources {
    /// Same rules as [`EpisodeSources::merge`].
    pub fn merge(&mut self, patch: &Self) {
        apply(&mut self.stream_hg, patch.stream_hg.as_ref());
        apply(&mut self.dood_stream, patch.dood_stream.as_ref());
        apply(&mut self.mega_cloud, patch.mega_cloud.as_ref());
        apply(&mut self.streamtape, patch.streamtape.as_ref());
    }
}

fn apply(slot: &mut Option<String>, value: Option<&String>) {
    if let Some(value) = value {
        *slot = if value.trim().is_empty() {
            None
        } else {
            Some(value.clone())
        };
    }
}

const MOVIE_PROVIDERS: [VideoProvider; 4] = [
    VideoProvider::StreamHg,
    VideoProvider::DoodStream,
    VideoProvider::MegaCloud,
    VideoProvider::Streamtape,
];

impl SourceSet for MovieSources {
    fn providers(&self) -> &'static [VideoProvider] {
        &MOVIE_PROVIDERS
    }

    fn raw(&self, provider: VideoProvider) -> Option<&str> {
        match provider {
            VideoProvider::StreamHg => self.stream_hg.as_deref(),
            VideoProvider::DoodStream => self.dood_stream.as_deref(),
            VideoProvider::MegaCloud => self.mega_cloud.as_deref(),
            VideoProvider::Streamtape => self.streamtape.as_deref(),
            VideoProvider::Mega => None,
        }
    }
}

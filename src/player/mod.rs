//! Video source selection for the watch pages.
//!
//! A [`SourceSelector`] tracks which provider is embedded for the episode or
//! movie being watched. Providers are tried in [`VideoProvider::PRIORITY`]
//! order, a still-available previous choice is kept across navigation and
//! load failures never switch providers on their own.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

pub use crate::models::{SourceSet, VideoProvider};

pub const TRY_ANOTHER_SOURCE: &str = "This source failed to load. Try another source.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Source {0} is not available for this video")]
    Unavailable(VideoProvider),

    #[error("Embed template for {provider} is invalid: {reason}")]
    InvalidTemplate {
        provider: VideoProvider,
        reason: String,
    },

    #[error("Embed URL for {provider} is invalid: {reason}")]
    InvalidUrl {
        provider: VideoProvider,
        reason: String,
    },
}

/// What happens when an embed reports a load failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the state untouched.
    #[default]
    Ignore,
    /// Remember the provider as failed and show the retry hint.
    Track,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    NoSource,
    Loading {
        provider: VideoProvider,
        #[serde(skip)]
        since: Instant,
    },
    Playing {
        provider: VideoProvider,
    },
    Failed {
        provider: VideoProvider,
        message: String,
    },
}

impl PlaybackState {
    #[must_use]
    pub const fn provider(&self) -> Option<VideoProvider> {
        match self {
            Self::NoSource => None,
            Self::Loading { provider, .. }
            | Self::Playing { provider }
            | Self::Failed { provider, .. } => Some(*provider),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSelector {
    policy: FailurePolicy,
    load_timeout: Duration,
    available: Vec<VideoProvider>,
    selected: Option<VideoProvider>,
    failed: Vec<VideoProvider>,
    state: PlaybackState,
}

impl SourceSelector {
    #[must_use]
    pub const fn new(policy: FailurePolicy, load_timeout: Duration) -> Self {
        Self {
            policy,
            load_timeout,
            available: Vec::new(),
            selected: None,
            failed: Vec::new(),
            state: PlaybackState::NoSource,
        }
    }

    /// Seeds the provider chosen on the previously watched video, for
    /// stateless callers that rebuild the selector on every request.
    #[must_use]
    pub const fn with_previous(mut self, previous: Option<VideoProvider>) -> Self {
        self.selected = previous;
        self
    }

    /// Called when navigating to a new episode or movie.
    pub fn enter<S: SourceSet>(&mut self, sources: &S, now: Instant) -> &PlaybackState {
        self.available = sources.available();
        self.failed.clear();

        let kept = self.selected.filter(|p| self.available.contains(p));
        self.selected = kept.or_else(|| self.available.first().copied());

        self.state = match self.selected {
            Some(provider) => PlaybackState::Loading {
                provider,
                since: now,
            },
            None => PlaybackState::NoSource,
        };
        &self.state
    }

    /// User picked a source button. Always starts a fresh load.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Unavailable`] if the current video has no
    /// identifier for `provider`.
    pub fn select(
        &mut self,
        provider: VideoProvider,
        now: Instant,
    ) -> Result<&PlaybackState, PlayerError> {
        if !self.available.contains(&provider) {
            return Err(PlayerError::Unavailable(provider));
        }
        self.selected = Some(provider);
        self.state = PlaybackState::Loading {
            provider,
            since: now,
        };
        Ok(&self.state)
    }

    /// The embedded player reported it is ready.
    pub fn on_ready(&mut self) -> &PlaybackState {
        if let PlaybackState::Loading { provider, .. } = self.state {
            self.state = PlaybackState::Playing { provider };
        }
        &self.state
    }

    /// Ends a load that has been pending for longer than the timeout.
    pub fn poll(&mut self, now: Instant) -> &PlaybackState {
        if let PlaybackState::Loading { provider, since } = self.state
            && now.saturating_duration_since(since) >= self.load_timeout
        {
            self.state = PlaybackState::Playing { provider };
        }
        &self.state
    }

    /// The embedded player reported a load failure.
    pub fn on_error(&mut self) -> &PlaybackState {
        if self.policy == FailurePolicy::Track
            && let Some(provider) = self.state.provider()
        {
            self.mark_failed(provider);
            self.state = PlaybackState::Failed {
                provider,
                message: TRY_ANOTHER_SOURCE.to_string(),
            };
        }
        &self.state
    }

    /// Records a provider that already failed earlier on this video without
    /// touching the current state. Ignored under [`FailurePolicy::Ignore`].
    pub fn mark_failed(&mut self, provider: VideoProvider) {
        if self.policy == FailurePolicy::Track
            && self.available.contains(&provider)
            && !self.failed.contains(&provider)
        {
            self.failed.push(provider);
        }
    }

    #[must_use]
    pub const fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub const fn selected(&self) -> Option<VideoProvider> {
        self.selected
    }

    #[must_use]
    pub fn available(&self) -> &[VideoProvider] {
        &self.available
    }

    #[must_use]
    pub fn failed(&self) -> &[VideoProvider] {
        &self.failed
    }

    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Iframe URL templates per provider. `{id}` is replaced with the
/// percent-encoded video id, `{raw}` with the id as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedTemplates {
    pub stream_hg: String,
    pub dood_stream: String,
    pub mega_cloud: String,
    pub mega: String,
    pub streamtape: String,
}

impl Default for EmbedTemplates {
    fn default() -> Self {
        Self {
            stream_hg: "https://streamhg.com/e/{id}".to_string(),
            dood_stream: "https://dood.to/e/{id}".to_string(),
            mega_cloud: "https://megacloud.tv/embed-2/e-1/{id}".to_string(),
            // Mega ids carry the decryption key after '#'.
            mega: "https://mega.nz/embed/{raw}".to_string(),
            streamtape: "https://streamtape.com/e/{id}".to_string(),
        }
    }
}

impl EmbedTemplates {
    #[must_use]
    pub fn template(&self, provider: VideoProvider) -> &str {
        match provider {
            VideoProvider::StreamHg => &self.stream_hg,
            VideoProvider::DoodStream => &self.dood_stream,
            VideoProvider::MegaCloud => &self.mega_cloud,
            VideoProvider::Mega => &self.mega,
            VideoProvider::Streamtape => &self.streamtape,
        }
    }

    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidUrl`] if the substituted template is not
    /// an absolute http(s) URL.
    pub fn embed_url(&self, provider: VideoProvider, video_id: &str) -> Result<Url, PlayerError> {
        let encoded = urlencoding::encode(video_id);
        let raw = self
            .template(provider)
            .replace("{id}", &encoded)
            .replace("{raw}", video_id);

        let url = Url::parse(&raw).map_err(|e| PlayerError::InvalidUrl {
            provider,
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PlayerError::InvalidUrl {
                provider,
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Embed URLs for every available source, in priority order.
    #[must_use]
    pub fn embeds<S: SourceSet>(&self, sources: &S) -> Vec<(VideoProvider, Url)> {
        sources
            .available()
            .into_iter()
            .filter_map(|provider| {
                let id = sources.source(provider)?;
                self.embed_url(provider, id).ok().map(|url| (provider, url))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`PlayerError::InvalidTemplate`] for a template without a
    /// placeholder or one that does not produce a valid URL.
    pub fn validate(&self) -> Result<(), PlayerError> {
        for provider in VideoProvider::PRIORITY {
            let template = self.template(provider);
            if !template.contains("{id}") && !template.contains("{raw}") {
                return Err(PlayerError::InvalidTemplate {
                    provider,
                    reason: "missing {id} placeholder".to_string(),
                });
            }
            self.embed_url(provider, "sample")
                .map_err(|e| PlayerError::InvalidTemplate {
                    provider,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeSources, MovieSources};

    const TIMEOUT: Duration = Duration::from_secs(8);

    fn episode_sources(providers: &[VideoProvider]) -> EpisodeSources {
        let mut sources = EpisodeSources::default();
        for provider in providers {
            let id = Some(format!("{}-id", provider.key()));
            match provider {
                VideoProvider::StreamHg => sources.stream_hg = id,
                VideoProvider::DoodStream => sources.dood_stream = id,
                VideoProvider::MegaCloud => sources.mega_cloud = id,
                VideoProvider::Mega => sources.mega = id,
                VideoProvider::Streamtape => sources.streamtape = id,
            }
        }
        sources
    }

    #[test]
    fn first_available_by_priority() {
        let mut selector = SourceSelector::new(FailurePolicy::Ignore, TIMEOUT);
        let now = Instant::now();
        let state = selector.enter(
            &episode_sources(&[VideoProvider::Streamtape, VideoProvider::MegaCloud]),
            now,
        );
        assert_eq!(state.provider(), Some(VideoProvider::MegaCloud));
    }

    #[test]
    fn previous_choice_sticks_when_available() {
        let mut selector = SourceSelector::new(FailurePolicy::Ignore, TIMEOUT);
        let now = Instant::now();
        selector.enter(
            &episode_sources(&[VideoProvider::StreamHg, VideoProvider::Mega]),
            now,
        );
        selector.select(VideoProvider::Mega, now).unwrap();

        selector.enter(
            &episode_sources(&[VideoProvider::DoodStream, VideoProvider::Mega]),
            now,
        );
        assert_eq!(selector.selected(), Some(VideoProvider::Mega));

        selector.enter(&episode_sources(&[VideoProvider::DoodStream]), now);
        assert_eq!(selector.selected(), Some(VideoProvider::DoodStream));
    }

    #[test]
    fn seeded_previous_choice_is_kept() {
        let mut selector = SourceSelector::new(FailurePolicy::Ignore, TIMEOUT)
            .with_previous(Some(VideoProvider::Streamtape));
        let state = selector.enter(
            &episode_sources(&[VideoProvider::StreamHg, VideoProvider::Streamtape]),
            Instant::now(),
        );
        assert_eq!(state.provider(), Some(VideoProvider::Streamtape));
    }

    #[test]
    fn no_sources_is_terminal() {
        let mut selector = SourceSelector::new(FailurePolicy::Track, TIMEOUT);
        let now = Instant::now();
        assert_eq!(
            selector.enter(&EpisodeSources::default(), now),
            &PlaybackState::NoSource
        );
        assert_eq!(
            selector.select(VideoProvider::StreamHg, now),
            Err(PlayerError::Unavailable(VideoProvider::StreamHg))
        );
        assert_eq!(selector.on_error(), &PlaybackState::NoSource);
    }

    #[test]
    fn loading_ends_on_ready_or_timeout() {
        let mut selector = SourceSelector::new(FailurePolicy::Ignore, TIMEOUT);
        let start = Instant::now();
        selector.enter(&episode_sources(&[VideoProvider::StreamHg]), start);

        assert!(matches!(
            selector.poll(start + Duration::from_secs(1)),
            PlaybackState::Loading { .. }
        ));
        assert!(matches!(
            selector.poll(start + TIMEOUT),
            PlaybackState::Playing { .. }
        ));

        selector.select(VideoProvider::StreamHg, start).unwrap();
        assert!(matches!(selector.on_ready(), PlaybackState::Playing { .. }));
    }

    #[test]
    fn anime_page_ignores_load_errors() {
        let mut selector = SourceSelector::new(FailurePolicy::Ignore, TIMEOUT);
        let now = Instant::now();
        selector.enter(
            &episode_sources(&[VideoProvider::StreamHg, VideoProvider::DoodStream]),
            now,
        );
        let before = selector.state().clone();
        assert_eq!(selector.on_error(), &before);
        assert!(selector.failed().is_empty());
    }

    #[test]
    fn movie_page_tracks_failures_without_failover() {
        let mut selector = SourceSelector::new(FailurePolicy::Track, TIMEOUT);
        let now = Instant::now();
        let sources = MovieSources {
            stream_hg: Some("a".to_string()),
            dood_stream: Some("b".to_string()),
            ..Default::default()
        };
        selector.enter(&sources, now);

        let state = selector.on_error().clone();
        assert_eq!(
            state,
            PlaybackState::Failed {
                provider: VideoProvider::StreamHg,
                message: TRY_ANOTHER_SOURCE.to_string(),
            }
        );
        assert_eq!(selector.failed(), [VideoProvider::StreamHg]);
        assert_eq!(selector.selected(), Some(VideoProvider::StreamHg));

        selector.select(VideoProvider::DoodStream, now).unwrap();
        assert!(matches!(
            selector.state(),
            PlaybackState::Loading {
                provider: VideoProvider::DoodStream,
                ..
            }
        ));
    }

    #[test]
    fn embed_ids_are_encoded() {
        let templates = EmbedTemplates::default();
        let url = templates
            .embed_url(VideoProvider::StreamHg, "a b/c")
            .unwrap();
        assert_eq!(url.as_str(), "https://streamhg.com/e/a%20b%2Fc");

        let mega = templates
            .embed_url(VideoProvider::Mega, "file#key")
            .unwrap();
        assert_eq!(mega.fragment(), Some("key"));
        assert!(templates.validate().is_ok());
    }

    #[test]
    fn templates_need_a_placeholder() {
        let templates = EmbedTemplates {
            streamtape: "https://streamtape.com/e/".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            templates.validate(),
            Err(PlayerError::InvalidTemplate {
                provider: VideoProvider::Streamtape,
                ..
            })
        ));
    }
}

//! Document-store implementation of [`TitleService`].
//!
//! Nested mutations and flag toggles go through [`DocumentTitleService::modify`],
//! which reads the title with its version, applies a change and writes it
//! back conditionally, re-reading on version conflicts.

use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::title_service::{CatalogError, TitleService};
use crate::domain::events::CatalogEvent;
use crate::domain::{EpisodeId, SeasonId, TitleId};
use crate::models::{
    Episode, EpisodePatch, NewEpisode, NewTitle, Season, Title, TitleFlag, TitlePatch,
};
use crate::remote::{Collection, DocumentStore, StoreError, encode_body};

pub struct DocumentTitleService {
    store: Arc<dyn DocumentStore>,
    event_bus: broadcast::Sender<CatalogEvent>,
    retry_limit: u32,
}

impl DocumentTitleService {
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        event_bus: broadcast::Sender<CatalogEvent>,
        retry_limit: u32,
    ) -> Self {
        Self {
            store,
            event_bus,
            retry_limit,
        }
    }

    fn publish(&self, event: CatalogEvent) {
        let _ = self.event_bus.send(event);
    }

    async fn load(&self, id: &TitleId) -> Result<(Title, i64), CatalogError> {
        let doc = self
            .store
            .get(Collection::Titles, id.as_str())
            .await
            .map_err(CatalogError::ReadFailed)?
            .ok_or_else(|| CatalogError::TitleNotFound(id.clone()))?;

        let title = doc.decode::<Title>().map_err(CatalogError::ReadFailed)?;
        Ok((title, doc.version))
    }

    /// Versioned read-modify-write of a title document.
    ///
    /// `change` sees the freshly read title and returns the fields to write
    /// plus the value to hand back. An error from `change` aborts without
    /// writing. `updated_at` is stamped on every write.
    async fn modify<R, F>(&self, id: &TitleId, mut change: F) -> Result<R, CatalogError>
    where
        R: Send,
        F: FnMut(&Title) -> Result<(Map<String, Value>, R), CatalogError> + Send,
    {
        let attempts = self.retry_limit + 1;

        for attempt in 1..=attempts {
            let (title, version) = self.load(id).await?;
            let (mut patch, result) = change(&title)?;
            patch.insert("updated_at".to_string(), json!(Utc::now()));

            match self
                .store
                .update(Collection::Titles, id.as_str(), patch, Some(version))
                .await
            {
                Ok(_) => return Ok(result),
                Err(StoreError::Conflict { actual, .. }) => {
                    debug!(%id, attempt, expected = version, actual, "Version conflict, re-reading title");
                    metrics::counter!("catalog_write_conflicts_total").increment(1);
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(CatalogError::TitleNotFound(id.clone()));
                }
                Err(e) => return Err(CatalogError::UpdateFailed(e)),
            }
        }

        warn!(%id, attempts, "Giving up after repeated version conflicts");
        Err(CatalogError::Conflict {
            id: id.to_string(),
            attempts,
        })
    }
}

fn seasons_patch(seasons: &[Season]) -> Result<Map<String, Value>, CatalogError> {
    let value = serde_json::to_value(seasons)
        .map_err(|e| CatalogError::UpdateFailed(StoreError::from(e)))?;
    let mut patch = Map::new();
    patch.insert("seasons".to_string(), value);
    Ok(patch)
}

fn record<T>(op: &'static str, result: &Result<T, CatalogError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    metrics::counter!("catalog_mutations_total", "op" => op, "outcome" => outcome).increment(1);
}

#[async_trait::async_trait]
impl TitleService for DocumentTitleService {
    async fn create_title(&self, input: NewTitle) -> Result<TitleId, CatalogError> {
        let result: Result<TitleId, CatalogError> = async {
            input.validate()?;

            let title = input.into_title(TitleId::default(), Utc::now());
            let body = encode_body(&title).map_err(CatalogError::CreateFailed)?;
            let doc = self
                .store
                .create(Collection::Titles, body)
                .await
                .map_err(CatalogError::CreateFailed)?;

            let id = TitleId::new(doc.id);
            info!(%id, name = %title.name, "Title created");
            self.publish(CatalogEvent::TitleCreated {
                id: id.to_string(),
                name: title.name,
            });
            Ok(id)
        }
        .await;

        record("create_title", &result);
        result
    }

    async fn get_title(&self, id: &TitleId) -> Result<Title, CatalogError> {
        self.load(id).await.map(|(title, _)| title)
    }

    async fn update_title(&self, id: &TitleId, patch: TitlePatch) -> Result<(), CatalogError> {
        let result: Result<(), CatalogError> = async {
            patch.validate()?;

            let mut body = encode_body(&patch).map_err(CatalogError::UpdateFailed)?;
            body.insert("updated_at".to_string(), json!(Utc::now()));

            self.store
                .update(Collection::Titles, id.as_str(), body, None)
                .await
                .map_err(|e| match e {
                    StoreError::NotFound { .. } => CatalogError::TitleNotFound(id.clone()),
                    other => CatalogError::UpdateFailed(other),
                })?;

            info!(%id, "Title updated");
            self.publish(CatalogEvent::TitleUpdated { id: id.to_string() });
            Ok(())
        }
        .await;

        record("update_title", &result);
        result
    }

    async fn delete_title(&self, id: &TitleId) -> Result<(), CatalogError> {
        let result = match self.store.delete(Collection::Titles, id.as_str()).await {
            Ok(true) => {
                info!(%id, "Title deleted");
                self.publish(CatalogEvent::TitleDeleted { id: id.to_string() });
                Ok(())
            }
            Ok(false) => Err(CatalogError::TitleNotFound(id.clone())),
            Err(e) => Err(CatalogError::DeleteFailed(e)),
        };

        record("delete_title", &result);
        result
    }

    async fn add_season(
        &self,
        title_id: &TitleId,
        number: u32,
    ) -> Result<SeasonId, CatalogError> {
        let season_id = SeasonId::generate();

        let result = self
            .modify(title_id, |title| {
                if title.season_by_number(number).is_some() {
                    warn!(%title_id, number, "Season number already exists");
                    return Err(CatalogError::DuplicateSeason { number });
                }

                let mut seasons = title.seasons.clone();
                seasons.push(Season {
                    id: season_id.clone(),
                    number,
                    episodes: Vec::new(),
                });
                seasons.sort_by_key(|s| s.number);

                Ok((seasons_patch(&seasons)?, season_id.clone()))
            })
            .await;

        if result.is_ok() {
            info!(%title_id, number, "Season added");
            self.publish(CatalogEvent::SeasonAdded {
                title_id: title_id.to_string(),
                number,
            });
        }
        record("add_season", &result);
        result
    }

    async fn add_episode(
        &self,
        title_id: &TitleId,
        season_id: &SeasonId,
        input: NewEpisode,
    ) -> Result<EpisodeId, CatalogError> {
        if let Err(e) = input.validate() {
            let result = Err(CatalogError::from(e));
            record("add_episode", &result);
            return result;
        }

        let episode = input.into_episode(EpisodeId::generate());
        let number = episode.number;

        let result = self
            .modify(title_id, |title| {
                let mut title = title.clone();
                let season = title
                    .season_mut(season_id)
                    .ok_or_else(|| CatalogError::SeasonNotFound(season_id.clone()))?;

                if season.episodes.iter().any(|e| e.number == number) {
                    warn!(%title_id, %season_id, number, "Episode number already exists");
                    return Err(CatalogError::DuplicateEpisode { number });
                }

                season.episodes.push(episode.clone());
                season.episodes.sort_by_key(|e| e.number);

                Ok((seasons_patch(&title.seasons)?, episode.id.clone()))
            })
            .await;

        if result.is_ok() {
            info!(%title_id, %season_id, number, "Episode added");
            self.publish(CatalogEvent::EpisodeAdded {
                title_id: title_id.to_string(),
                season_id: season_id.to_string(),
                number,
            });
        }
        record("add_episode", &result);
        result
    }

    async fn update_episode(
        &self,
        title_id: &TitleId,
        season_id: &SeasonId,
        episode_id: &EpisodeId,
        patch: EpisodePatch,
    ) -> Result<Episode, CatalogError> {
        let result = self
            .modify(title_id, |title| {
                let mut title = title.clone();
                let season = title
                    .season_mut(season_id)
                    .ok_or_else(|| CatalogError::SeasonNotFound(season_id.clone()))?;

                if let Some(number) = patch.number
                    && season
                        .episodes
                        .iter()
                        .any(|e| e.number == number && &e.id != episode_id)
                {
                    return Err(CatalogError::DuplicateEpisode { number });
                }

                let episode = season
                    .episodes
                    .iter_mut()
                    .find(|e| &e.id == episode_id)
                    .ok_or_else(|| CatalogError::EpisodeNotFound(episode_id.clone()))?;
                patch.apply(episode);
                let updated = episode.clone();
                season.episodes.sort_by_key(|e| e.number);

                Ok((seasons_patch(&title.seasons)?, updated))
            })
            .await;

        if result.is_ok() {
            info!(%title_id, %episode_id, "Episode updated");
            self.publish(CatalogEvent::EpisodeUpdated {
                title_id: title_id.to_string(),
                episode_id: episode_id.to_string(),
            });
        }
        record("update_episode", &result);
        result
    }

    async fn delete_episode(
        &self,
        title_id: &TitleId,
        season_id: &SeasonId,
        episode_id: &EpisodeId,
    ) -> Result<(), CatalogError> {
        let result = self
            .modify(title_id, |title| {
                let mut title = title.clone();
                let season = title
                    .season_mut(season_id)
                    .ok_or_else(|| CatalogError::SeasonNotFound(season_id.clone()))?;

                let before = season.episodes.len();
                season.episodes.retain(|e| &e.id != episode_id);
                if season.episodes.len() == before {
                    return Err(CatalogError::EpisodeNotFound(episode_id.clone()));
                }

                Ok((seasons_patch(&title.seasons)?, ()))
            })
            .await;

        if result.is_ok() {
            info!(%title_id, %episode_id, "Episode deleted");
            self.publish(CatalogEvent::EpisodeDeleted {
                title_id: title_id.to_string(),
                episode_id: episode_id.to_string(),
            });
        }
        record("delete_episode", &result);
        result
    }

    async fn toggle_flag(
        &self,
        title_id: &TitleId,
        flag: TitleFlag,
    ) -> Result<bool, CatalogError> {
        let result = self
            .modify(title_id, |title| {
                let value = !title.flags.get(flag);
                let mut patch = Map::new();
                patch.insert(flag.field().to_string(), Value::Bool(value));
                Ok((patch, value))
            })
            .await;

        if let Ok(value) = result {
            info!(%title_id, %flag, value, "Flag toggled");
            self.publish(CatalogEvent::FlagToggled {
                title_id: title_id.to_string(),
                flag: flag.to_string(),
                value,
            });
        }
        record("toggle_flag", &result);
        result
    }
}

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::movie_service::MovieService;
use super::title_service::CatalogError;
use crate::domain::MovieId;
use crate::domain::events::CatalogEvent;
use crate::models::{Movie, MoviePatch, NewMovie};
use crate::remote::{Collection, DocumentStore, OrderBy, StoreError, encode_body};

pub struct DocumentMovieService {
    store: Arc<dyn DocumentStore>,
    event_bus: broadcast::Sender<CatalogEvent>,
    retry_limit: u32,
}

impl DocumentMovieService {
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

    async fn load(&self, id: &MovieId) -> Result<(Movie, i64), CatalogError> {
        let doc = self
            .store
            .get(Collection::Movies, id.as_str())
            .await
            .map_err(CatalogError::ReadFailed)?
            .ok_or_else(|| CatalogError::MovieNotFound(id.clone()))?;
        let movie = doc.decode::<Movie>().map_err(CatalogError::ReadFailed)?;
        Ok((movie, doc.version))
    }

    async fn apply_patch(&self, id: &MovieId, patch: &MoviePatch) -> Result<Movie, CatalogError> {
        patch.validate()?;
        let attempts = self.retry_limit + 1;

        for attempt in 1..=attempts {
            let (mut movie, version) = self.load(id).await?;

            let mut body = encode_body(patch).map_err(CatalogError::UpdateFailed)?;
            if let Some(sources) = &patch.sources {
                movie.sources.merge(sources);
                let merged = serde_json::to_value(&movie.sources)
                    .map_err(|e| CatalogError::UpdateFailed(StoreError::from(e)))?;
                body.insert("sources".to_string(), merged);
            }

            match self
                .store
                .update(Collection::Movies, id.as_str(), body, Some(version))
                .await
            {
                Ok(doc) => return doc.decode().map_err(CatalogError::UpdateFailed),
                Err(StoreError::Conflict { .. }) => {
                    debug!(%id, attempt, "Version conflict, re-reading movie");
                }
                Err(StoreError::NotFound { .. }) => {
                    return Err(CatalogError::MovieNotFound(id.clone()));
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

fn record<T>(op: &'static str, result: &Result<T, CatalogError>) {
    let outcome = result.as_ref().map_or_else(CatalogError::outcome, |_| "ok");
    metrics::counter!("catalog_mutations_total", "op" => op, "outcome" => outcome).increment(1);
}

#[async_trait::async_trait]
impl MovieService for DocumentMovieService {
    async fn create_movie(&self, input: NewMovie) -> Result<MovieId, CatalogError> {
        let result: Result<MovieId, CatalogError> = async {
            input.validate()?;

            let movie = input.into_movie(MovieId::default());
            let body = encode_body(&movie).map_err(CatalogError::CreateFailed)?;
            let doc = self
                .store
                .create(Collection::Movies, body)
                .await
                .map_err(CatalogError::CreateFailed)?;

            let id = MovieId::new(doc.id);
            info!(%id, title = %movie.title, "Movie created");
            let _ = self.event_bus.send(CatalogEvent::MovieCreated {
                id: id.to_string(),
                title: movie.title,
            });
            Ok(id)
        }
        .await;

        record("create_movie", &result);
        result
    }

    async fn get_movie(&self, id: &MovieId) -> Result<Movie, CatalogError> {
        self.load(id).await.map(|(movie, _)| movie)
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, CatalogError> {
        let docs = self
            .store
            .list(Collection::Movies, Some(OrderBy::desc("release_date")))
            .await
            .map_err(CatalogError::ReadFailed)?;

        Ok(docs
            .iter()
            .filter_map(|doc| match doc.decode::<Movie>() {
                Ok(movie) => Some(movie),
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "Skipping undecodable movie");
                    None
                }
            })
            .collect())
    }

    async fn update_movie(&self, id: &MovieId, patch: MoviePatch) -> Result<Movie, CatalogError> {
        let result = self.apply_patch(id, &patch).await;
        if result.is_ok() {
            info!(%id, "Movie updated");
            let _ = self
                .event_bus
                .send(CatalogEvent::MovieUpdated { id: id.to_string() });
        }
        record("update_movie", &result);
        result
    }

    async fn delete_movie(&self, id: &MovieId) -> Result<(), CatalogError> {
        let result = match self.store.delete(Collection::Movies, id.as_str()).await {
            Ok(true) => {
                info!(%id, "Movie deleted");
                let _ = self
                    .event_bus
                    .send(CatalogEvent::MovieDeleted { id: id.to_string() });
                Ok(())
            }
            Ok(false) => Err(CatalogError::MovieNotFound(id.clone())),
            Err(e) => Err(CatalogError::DeleteFailed(e)),
        };
        record("delete_movie", &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieSources, SourceSet, VideoProvider};
    use crate::remote::MemoryStore;
    use chrono::{DateTime, Utc};

    fn service() -> DocumentMovieService {
        let (tx, _) = broadcast::channel(16);
        DocumentMovieService::new(Arc::new(MemoryStore::new()), tx, 3)
    }

    fn new_movie(title: &str, released: &str) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            synopsis: String::new(),
            release_date: DateTime::parse_from_rfc3339(released)
                .unwrap()
                .with_timezone(&Utc),
            duration: "1h 40m".to_string(),
            genres: vec!["Drama".to_string()],
            thumbnail: String::new(),
            sources: MovieSources {
                dood_stream: Some("dd1".to_string()),
                ..Default::default()
            },
            is_new: true,
        }
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let service = service();
        for (title, date) in [
            ("Old", "2016-08-26T00:00:00Z"),
            ("New", "2024-01-01T00:00:00Z"),
            ("Mid", "2019-07-19T00:00:00Z"),
        ] {
            service.create_movie(new_movie(title, date)).await.unwrap();
        }

        let titles: Vec<String> = service
            .list_movies()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, ["New", "Mid", "Old"]);
    }

    #[tokio::test]
    async fn movies_need_a_source() {
        let service = service();
        let mut input = new_movie("M", "2020-01-01T00:00:00Z");
        input.sources = MovieSources::default();
        let err = service.create_movie(input).await.unwrap_err();
        assert_eq!(err.field(), Some("sources"));
    }

    #[tokio::test]
    async fn source_patches_merge_per_provider() {
        let service = service();
        let id = service
            .create_movie(new_movie("M", "2020-01-01T00:00:00Z"))
            .await
            .unwrap();

        let movie = service
            .update_movie(
                &id,
                MoviePatch {
                    sources: Some(MovieSources {
                        streamtape: Some("st1".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(
            movie.sources.available(),
            [VideoProvider::DoodStream, VideoProvider::Streamtape]
        );
        assert_eq!(movie.title, "M");
    }

    #[tokio::test]
    async fn delete_unknown_movie_is_not_found() {
        let service = service();
        assert!(matches!(
            service.delete_movie(&MovieId::new("missing")).await,
            Err(CatalogError::MovieNotFound(_))
        ));
    }
}

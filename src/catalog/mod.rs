//! In-memory catalog kept in sync with the document store.
//!
//! [`CatalogStore`] owns the authoritative snapshot every read path works
//! from. Snapshots are replaced wholesale by the subscription tasks through
//! [`CatalogStore::apply_remote`]; nothing else writes them.

pub mod history;
pub mod query;
pub mod views;

pub use history::WatchHistory;
pub use query::{Recommendation, RecentEpisode, Section, SortKey, TitleQuery};
pub use views::ViewCache;

use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::events::CatalogEvent;
use crate::domain::{MovieId, TitleId};
use crate::models::{Movie, Title};
use crate::remote::{Collection, Document, DocumentStore, StoreError};

/// Broad class of a subscription failure, used to pick the message shown
/// to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionErrorKind {
    PermissionDenied,
    Unavailable,
    Other,
}

impl SubscriptionErrorKind {
    #[must_use]
    pub const fn classify(err: &StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(_) => Self::PermissionDenied,
            StoreError::Unavailable(_) => Self::Unavailable,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "The catalog is not readable with the current credentials.",
            Self::Unavailable => "The catalog service is unavailable. Check the connection.",
            Self::Other => "Failed to load the catalog.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CatalogStatus {
    /// At least one collection has not delivered its first snapshot.
    Loading,
    Ready,
    /// A subscription failed. Reads should surface the error instead of
    /// serving a partial catalog.
    Failed {
        collection: Collection,
        kind: SubscriptionErrorKind,
        message: String,
    },
}

/// A collection whose subscription is currently failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub collection: Collection,
    pub kind: SubscriptionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Incremented on every applied update.
    pub version: u64,
    pub titles: Arc<Vec<Title>>,
    /// Newest release first.
    pub movies: Arc<Vec<Movie>>,
    /// Titles with the trending flag, recomputed with every titles update.
    pub trending: Arc<Vec<Title>>,
    pub status: CatalogStatus,
    pub titles_loaded: bool,
    pub movies_loaded: bool,
    /// Failing collections in the order they failed. A collection leaves
    /// the list only when it delivers a new snapshot.
    pub failures: Vec<CollectionFailure>,
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            titles: Arc::default(),
            movies: Arc::default(),
            trending: Arc::default(),
            status: CatalogStatus::Loading,
            titles_loaded: false,
            movies_loaded: false,
            failures: Vec::new(),
        }
    }
}

impl CatalogSnapshot {
    #[must_use]
    pub fn title(&self, id: &TitleId) -> Option<&Title> {
        self.titles.iter().find(|t| &t.id == id)
    }

    #[must_use]
    pub fn movie(&self, id: &MovieId) -> Option<&Movie> {
        self.movies.iter().find(|m| &m.id == id)
    }

    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.status, CatalogStatus::Ready)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, CatalogStatus::Failed { .. })
    }

    fn clear_failure(&mut self, collection: Collection) {
        self.failures.retain(|f| f.collection != collection);
    }

    fn settle_status(&mut self) {
        self.status = if let Some(failure) = self.failures.first() {
            CatalogStatus::Failed {
                collection: failure.collection,
                kind: failure.kind,
                message: failure.message.clone(),
            }
        } else if self.titles_loaded && self.movies_loaded {
            CatalogStatus::Ready
        } else {
            CatalogStatus::Loading
        };
    }
}

/// One message from a collection subscription.
#[derive(Debug, Clone)]
pub enum RemoteUpdate {
    Titles(Vec<Document>),
    Movies(Vec<Document>),
    Failed {
        collection: Collection,
        error: StoreError,
    },
}

impl RemoteUpdate {
    #[must_use]
    pub const fn snapshot(collection: Collection, docs: Vec<Document>) -> Self {
        match collection {
            Collection::Titles => Self::Titles(docs),
            Collection::Movies => Self::Movies(docs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub purge_sample_titles: bool,
    pub sample_title_sentinel: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            purge_sample_titles: true,
            sample_title_sentinel: "Sample Anime".to_string(),
        }
    }
}

pub struct CatalogStore {
    snapshot: watch::Sender<Arc<CatalogSnapshot>>,
    events: broadcast::Sender<CatalogEvent>,
    options: CatalogOptions,
    tasks: Mutex<HashMap<Collection, JoinHandle<()>>>,
    purge_attempted: AtomicBool,
}

impl CatalogStore {
    #[must_use]
    pub fn new(events: broadcast::Sender<CatalogEvent>, options: CatalogOptions) -> Arc<Self> {
        let (snapshot, _) = watch::channel(Arc::new(CatalogSnapshot::default()));
        Arc::new(Self {
            snapshot,
            events,
            options,
            tasks: Mutex::new(HashMap::new()),
            purge_attempted: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Resolves with the first snapshot (current or future) matching `pred`.
    pub async fn wait_for<F>(&self, mut pred: F) -> Arc<CatalogSnapshot>
    where
        F: FnMut(&CatalogSnapshot) -> bool,
    {
        let mut rx = self.snapshot.subscribe();
        match rx.wait_for(|snap| pred(snap)).await {
            Ok(snap) => Arc::clone(&snap),
            // The sender lives in `self`, so this only happens mid-drop.
            Err(_) => self.snapshot(),
        }
    }

    /// Replaces the affected part of the snapshot. Returns the new version.
    pub fn apply_remote(&self, update: RemoteUpdate) -> u64 {
        let mut event = None;

        self.snapshot.send_modify(|current| {
            let mut next = CatalogSnapshot::clone(current);
            next.version += 1;

            match update {
                RemoteUpdate::Titles(docs) => {
                    let titles: Vec<Title> = decode_all(Collection::Titles, &docs);
                    next.trending = Arc::new(query::trending(&titles));
                    next.titles = Arc::new(titles);
                    next.titles_loaded = true;
                    next.clear_failure(Collection::Titles);
                    next.settle_status();
                    record_gauge("catalog_titles", next.titles.len());
                    event = Some(CatalogEvent::TitlesUpdated {
                        version: next.version,
                        count: next.titles.len(),
                    });
                }
                RemoteUpdate::Movies(docs) => {
                    let mut movies: Vec<Movie> = decode_all(Collection::Movies, &docs);
                    movies.sort_by(|a, b| b.release_date.cmp(&a.release_date));
                    next.movies = Arc::new(movies);
                    next.movies_loaded = true;
                    next.clear_failure(Collection::Movies);
                    next.settle_status();
                    record_gauge("catalog_movies", next.movies.len());
                    event = Some(CatalogEvent::MoviesUpdated {
                        version: next.version,
                        count: next.movies.len(),
                    });
                }
                RemoteUpdate::Failed { collection, error } => {
                    let kind = SubscriptionErrorKind::classify(&error);
                    error!(%collection, ?kind, error = %error, "Catalog subscription failed");
                    let message = error.to_string();
                    next.clear_failure(collection);
                    next.failures.push(CollectionFailure {
                        collection,
                        kind,
                        message: message.clone(),
                    });
                    next.settle_status();
                    event = Some(CatalogEvent::SubscriptionFailed {
                        collection: collection.to_string(),
                        kind,
                        message,
                    });
                }
            }

            *current = Arc::new(next);
        });

        if let Some(event) = event {
            // No listeners is fine.
            let _ = self.events.send(event);
        }

        self.snapshot.borrow().version
    }

    /// Starts the subscriptions for both collections. Collections that
    /// already have a running task are left alone.
    pub async fn activate(self: &Arc<Self>, store: Arc<dyn DocumentStore>) {
        let mut tasks = self.tasks.lock().await;

        if self.options.purge_sample_titles && !self.purge_attempted.swap(true, Ordering::SeqCst) {
            self.purge_sample_titles(store.as_ref()).await;
        }

        for collection in Collection::ALL {
            if tasks.get(&collection).is_some_and(|task| !task.is_finished()) {
                debug!(%collection, "Subscription already active");
                continue;
            }

            match store.subscribe(collection).await {
                Ok(stream) => {
                    let handle = tokio::spawn(run_subscription(
                        Arc::downgrade(self),
                        collection,
                        stream,
                    ));
                    tasks.insert(collection, handle);
                    info!(%collection, "Catalog subscription started");
                }
                Err(error) => {
                    self.apply_remote(RemoteUpdate::Failed { collection, error });
                }
            }
        }
    }

    /// Stops every subscription task. The last snapshot stays readable.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for (collection, task) in tasks.drain() {
            task.abort();
            debug!(%collection, "Catalog subscription stopped");
        }
    }

    /// Deletes titles left over from seeding. Failures are logged and do not
    /// block activation.
    async fn purge_sample_titles(&self, store: &dyn DocumentStore) {
        let sentinel = self.options.sample_title_sentinel.as_str();

        let docs = match store.list(Collection::Titles, None).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "Could not list titles for sample cleanup");
                return;
            }
        };

        let mut removed = 0;
        for doc in docs
            .iter()
            .filter(|d| d.body.get("name").and_then(|v| v.as_str()) == Some(sentinel))
        {
            match store.delete(Collection::Titles, &doc.id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(id = %doc.id, error = %e, "Failed to delete sample title"),
            }
        }

        if removed > 0 {
            info!(count = removed, sentinel, "Removed sample titles");
            let _ = self
                .events
                .send(CatalogEvent::SampleTitlesPurged { count: removed });
        }
    }
}

async fn run_subscription(
    catalog: Weak<CatalogStore>,
    collection: Collection,
    mut stream: crate::remote::Subscription,
) {
    while let Some(item) = stream.next().await {
        let Some(catalog) = catalog.upgrade() else {
            break;
        };
        let update = match item {
            Ok(docs) => RemoteUpdate::snapshot(collection, docs),
            Err(error) => RemoteUpdate::Failed { collection, error },
        };
        catalog.apply_remote(update);
    }
    debug!(%collection, "Catalog subscription ended");
}

fn decode_all<T: serde::de::DeserializeOwned>(collection: Collection, docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%collection, id = %doc.id, error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn record_gauge(name: &'static str, count: usize) {
    metrics::gauge!(name).set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryStore, encode_body};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn catalog() -> (Arc<CatalogStore>, broadcast::Receiver<CatalogEvent>) {
        let (tx, rx) = broadcast::channel(64);
        (CatalogStore::new(tx, CatalogOptions::default()), rx)
    }

    fn title_doc(id: &str, name: &str, trending: bool) -> Document {
        let now = Utc::now().to_rfc3339();
        Document {
            id: id.to_string(),
            version: 1,
            body: json!({
                "name": name,
                "trending": trending,
                "created_at": now,
                "updated_at": now,
            })
            .as_object()
            .cloned()
            .unwrap(),
        }
    }

    fn movie_doc(id: &str, released: &str) -> Document {
        Document {
            id: id.to_string(),
            version: 1,
            body: json!({ "title": id, "release_date": released })
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    async fn settle<F>(catalog: &CatalogStore, pred: F) -> Arc<CatalogSnapshot>
    where
        F: FnMut(&CatalogSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), catalog.wait_for(pred))
            .await
            .expect("catalog did not reach the expected state")
    }

    #[test]
    fn loading_until_both_collections_arrive() {
        let (catalog, _) = catalog();
        assert_eq!(catalog.snapshot().status, CatalogStatus::Loading);

        catalog.apply_remote(RemoteUpdate::Titles(vec![]));
        assert_eq!(catalog.snapshot().status, CatalogStatus::Loading);

        catalog.apply_remote(RemoteUpdate::Movies(vec![]));
        assert!(catalog.snapshot().is_ready());
    }

    #[test]
    fn trending_is_recomputed_from_titles() {
        let (catalog, _) = catalog();
        catalog.apply_remote(RemoteUpdate::Titles(vec![
            title_doc("a", "A", true),
            title_doc("b", "B", false),
        ]));
        let snap = catalog.snapshot();
        assert_eq!(snap.trending.len(), 1);
        assert_eq!(snap.trending[0].id.as_str(), "a");

        catalog.apply_remote(RemoteUpdate::Titles(vec![title_doc("b", "B", true)]));
        let snap = catalog.snapshot();
        assert_eq!(snap.titles.len(), 1);
        assert_eq!(snap.trending[0].id.as_str(), "b");
    }

    #[test]
    fn movies_are_newest_first() {
        let (catalog, _) = catalog();
        catalog.apply_remote(RemoteUpdate::Movies(vec![
            movie_doc("old", "2020-01-01T00:00:00Z"),
            movie_doc("new", "2024-06-01T00:00:00Z"),
            movie_doc("mid", "2022-01-01T00:00:00Z"),
        ]));
        let ids: Vec<_> = catalog
            .snapshot()
            .movies
            .iter()
            .map(|m| m.id.as_str().to_string())
            .collect();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[test]
    fn undecodable_documents_are_skipped() {
        let (catalog, _) = catalog();
        let broken = Document {
            id: "x".to_string(),
            version: 1,
            body: json!({ "rating": "high" }).as_object().cloned().unwrap(),
        };
        catalog.apply_remote(RemoteUpdate::Titles(vec![broken, title_doc("a", "A", false)]));
        assert_eq!(catalog.snapshot().titles.len(), 1);
    }

    #[test]
    fn permission_errors_are_classified() {
        let (catalog, mut events) = catalog();
        catalog.apply_remote(RemoteUpdate::Failed {
            collection: Collection::Titles,
            error: StoreError::PermissionDenied("rules".into()),
        });

        let snap = catalog.snapshot();
        assert!(matches!(
            snap.status,
            CatalogStatus::Failed {
                kind: SubscriptionErrorKind::PermissionDenied,
                collection: Collection::Titles,
                ..
            }
        ));
        assert!(matches!(
            events.try_recv(),
            Ok(CatalogEvent::SubscriptionFailed { .. })
        ));
        assert_eq!(
            SubscriptionErrorKind::classify(&StoreError::Unavailable("down".into())),
            SubscriptionErrorKind::Unavailable
        );
        assert_eq!(
            SubscriptionErrorKind::classify(&StoreError::Backend("x".into())),
            SubscriptionErrorKind::Other
        );
    }

    #[test]
    fn other_collection_does_not_clear_a_failure() {
        let (catalog, _) = catalog();
        catalog.apply_remote(RemoteUpdate::Titles(vec![]));
        catalog.apply_remote(RemoteUpdate::Failed {
            collection: Collection::Titles,
            error: StoreError::Unavailable("down".into()),
        });
        catalog.apply_remote(RemoteUpdate::Movies(vec![]));
        assert!(catalog.snapshot().is_failed());

        catalog.apply_remote(RemoteUpdate::Titles(vec![]));
        assert!(catalog.snapshot().is_ready());
    }

    #[test]
    fn each_failed_collection_must_recover() {
        let (catalog, _) = catalog();
        catalog.apply_remote(RemoteUpdate::Titles(vec![]));
        catalog.apply_remote(RemoteUpdate::Movies(vec![]));
        catalog.apply_remote(RemoteUpdate::Failed {
            collection: Collection::Titles,
            error: StoreError::PermissionDenied("rules".into()),
        });
        catalog.apply_remote(RemoteUpdate::Failed {
            collection: Collection::Movies,
            error: StoreError::Unavailable("down".into()),
        });
        assert_eq!(catalog.snapshot().failures.len(), 2);

        catalog.apply_remote(RemoteUpdate::Movies(vec![]));
        let snap = catalog.snapshot();
        assert!(matches!(
            snap.status,
            CatalogStatus::Failed {
                collection: Collection::Titles,
                kind: SubscriptionErrorKind::PermissionDenied,
                ..
            }
        ));
        assert_eq!(snap.failures.len(), 1);

        catalog.apply_remote(RemoteUpdate::Titles(vec![]));
        let snap = catalog.snapshot();
        assert!(snap.is_ready());
        assert!(snap.failures.is_empty());
    }

    #[test]
    fn repeated_failure_replaces_the_entry() {
        let (catalog, _) = catalog();
        for message in ["first", "second"] {
            catalog.apply_remote(RemoteUpdate::Failed {
                collection: Collection::Movies,
                error: StoreError::Backend(message.into()),
            });
        }
        let snap = catalog.snapshot();
        assert_eq!(snap.failures.len(), 1);
        assert!(snap.failures[0].message.contains("second"));
    }

    #[tokio::test]
    async fn activation_tracks_remote_writes() {
        let store = MemoryStore::new();
        let (catalog, _) = catalog();
        catalog.activate(Arc::new(store.clone())).await;

        settle(&catalog, CatalogSnapshot::is_ready).await;

        store
            .create(
                Collection::Titles,
                encode_body(&title_doc("ignored", "Bleach", true).body).unwrap(),
            )
            .await
            .unwrap();

        let snap = settle(&catalog, |s| s.titles.len() == 1).await;
        assert_eq!(snap.titles[0].name, "Bleach");
        assert_eq!(snap.trending.len(), 1);

        catalog.shutdown().await;
    }

    #[tokio::test]
    async fn activation_is_idempotent_and_purges_once() {
        let store = MemoryStore::new();
        for name in ["Sample Anime", "Real Show", "Sample Anime"] {
            store
                .create(
                    Collection::Titles,
                    encode_body(&title_doc("x", name, false).body).unwrap(),
                )
                .await
                .unwrap();
        }

        let (catalog, mut events) = catalog();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        catalog.activate(Arc::clone(&shared)).await;

        let snap = settle(&catalog, CatalogSnapshot::is_ready).await;
        assert_eq!(snap.titles.len(), 1);
        assert_eq!(snap.titles[0].name, "Real Show");

        let mut purged = None;
        while let Ok(event) = events.try_recv() {
            if let CatalogEvent::SampleTitlesPurged { count } = event {
                purged = Some(count);
            }
        }
        assert_eq!(purged, Some(2));

        // A sentinel created after activation survives re-activation.
        store
            .create(
                Collection::Titles,
                encode_body(&title_doc("x", "Sample Anime", false).body).unwrap(),
            )
            .await
            .unwrap();
        catalog.activate(shared).await;
        settle(&catalog, |s| s.titles.len() == 2).await;
        assert_eq!(catalog.tasks.lock().await.len(), 2);

        catalog.shutdown().await;
    }

    #[tokio::test]
    async fn injected_failure_moves_to_failed() {
        let store = MemoryStore::new();
        let (catalog, _) = catalog();
        catalog.activate(Arc::new(store.clone())).await;
        settle(&catalog, CatalogSnapshot::is_ready).await;

        store
            .inject_failure(Some(StoreError::PermissionDenied("revoked".into())))
            .await;

        let snap = settle(&catalog, CatalogSnapshot::is_failed).await;
        assert!(matches!(
            snap.status,
            CatalogStatus::Failed {
                kind: SubscriptionErrorKind::PermissionDenied,
                ..
            }
        ));
        catalog.shutdown().await;
    }
}

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::catalog::{CatalogSnapshot, CatalogStore, ViewCache};
use crate::config::{Config, StoreBackend};
use crate::db::Store;
use crate::domain::events::CatalogEvent;
use crate::remote::{DocumentStore, MemoryStore};
use crate::services::{DocumentMovieService, DocumentTitleService, MovieService, TitleService};

/// Opens the document store selected by `general.store_backend`.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.general.store_backend {
        StoreBackend::Sqlite => {
            let store = Store::with_pool_options(
                &config.general.database_path,
                config.general.max_db_connections,
                config.general.min_db_connections,
            )
            .await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; catalog changes will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Arc<dyn DocumentStore>,

    pub catalog: Arc<CatalogStore>,

    pub views: Arc<ViewCache>,

    pub event_bus: broadcast::Sender<CatalogEvent>,

    pub title_service: Arc<dyn TitleService>,

    pub movie_service: Arc<dyn MovieService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = open_store(&config).await?;
        Self::with_store(config, store).await
    }

    /// Builds the state around an existing store and activates the catalog
    /// subscriptions.
    pub async fn with_store(config: Config, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);

        let catalog = CatalogStore::new(event_bus.clone(), config.catalog.options());
        let views = Arc::new(ViewCache::new(config.catalog.view_cache_capacity));

        let retry_limit = config.catalog.toggle_retry_limit;
        let title_service: Arc<dyn TitleService> = Arc::new(DocumentTitleService::new(
            Arc::clone(&store),
            event_bus.clone(),
            retry_limit,
        ));
        let movie_service: Arc<dyn MovieService> = Arc::new(DocumentMovieService::new(
            Arc::clone(&store),
            event_bus.clone(),
            retry_limit,
        ));

        catalog.activate(Arc::clone(&store)).await;
        info!("Catalog subscriptions activated");

        Ok(Self {
            config: Arc::new(config),
            store,
            catalog,
            views,
            event_bus,
            title_service,
            movie_service,
        })
    }

    /// Waits until the catalog is ready or failed, or `timeout` elapses.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> Arc<CatalogSnapshot> {
        let settled = self
            .catalog
            .wait_for(|snap| snap.is_ready() || snap.is_failed());
        match tokio::time::timeout(timeout, settled).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                warn!(?timeout, "Catalog still loading");
                self.catalog.snapshot()
            }
        }
    }

    pub async fn shutdown(&self) {
        self.catalog.shutdown().await;
    }
}

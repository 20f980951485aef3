use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Statement,
};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::entities::{documents, prelude::*};
use crate::remote::{
    Collection, Document, DocumentStore, OrderBy, StoreError, Subscription, snapshot_stream,
    sort_documents,
};

pub mod migrator;

/// Unconditional updates re-read and retry this many times when another
/// writer bumps the version in between.
const MERGE_ATTEMPTS: usize = 5;

/// SQLite-backed document store.
///
/// Change notifications are process-local: subscribers see every write made
/// through this `Store` (and its clones).
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    changes: broadcast::Sender<Collection>,
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::Unavailable(err.to_string()),
            _ => Self::Backend(err.to_string()),
        }
    }
}

impl Store {
    pub async fn new(db_url: &str) -> anyhow::Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> anyhow::Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        let (changes, _) = broadcast::channel(64);
        Ok(Self { conn, changes })
    }

    fn now() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn to_document(model: documents::Model) -> Result<Document, StoreError> {
        let body: Map<String, Value> = serde_json::from_str(&model.body)?;
        Ok(Document {
            id: model.id,
            version: model.version,
            body,
        })
    }

    fn notify(&self, collection: Collection) {
        let _ = self.changes.send(collection);
    }

    async fn find(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<documents::Model>, StoreError> {
        Ok(
            Documents::find_by_id((collection.as_str().to_string(), id.to_string()))
                .one(&self.conn)
                .await?,
        )
    }
}

#[async_trait]
impl DocumentStore for Store {
    async fn create(
        &self,
        collection: Collection,
        mut body: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        body.remove("id");
        let id = uuid::Uuid::new_v4().to_string();
        let now = Self::now();

        let model = documents::ActiveModel {
            collection: Set(collection.as_str().to_string()),
            id: Set(id.clone()),
            version: Set(1),
            body: Set(serde_json::to_string(&body)?),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        Documents::insert(model)
            .exec_without_returning(&self.conn)
            .await?;

        debug!(%collection, %id, "Document created");
        self.notify(collection);

        Ok(Document {
            id,
            version: 1,
            body,
        })
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.find(collection, id)
            .await?
            .map(Self::to_document)
            .transpose()
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mut patch: Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<Document, StoreError> {
        patch.remove("id");

        for _ in 0..MERGE_ATTEMPTS {
            let model = self
                .find(collection, id)
                .await?
                .ok_or_else(|| StoreError::NotFound {
                    collection,
                    id: id.to_string(),
                })?;

            if let Some(expected) = expected_version
                && expected != model.version
            {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: model.version,
                });
            }

            let current = model.version;
            let mut document = Self::to_document(model)?;
            document.body.extend(patch.clone());
            document.version = current + 1;

            let result = Documents::update_many()
                .col_expr(
                    documents::Column::Body,
                    Expr::value(serde_json::to_string(&document.body)?),
                )
                .col_expr(documents::Column::Version, Expr::value(document.version))
                .col_expr(documents::Column::UpdatedAt, Expr::value(Self::now()))
                .filter(documents::Column::Collection.eq(collection.as_str()))
                .filter(documents::Column::Id.eq(id))
                .filter(documents::Column::Version.eq(current))
                .exec(&self.conn)
                .await?;

            if result.rows_affected > 0 {
                self.notify(collection);
                return Ok(document);
            }

            // Lost the race against another writer.
            if let Some(expected) = expected_version {
                let actual = self
                    .find(collection, id)
                    .await?
                    .map_or(expected, |m| m.version);
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual,
                });
            }
            debug!(%collection, %id, "Concurrent write detected, retrying merge");
        }

        Err(StoreError::Backend(format!(
            "gave up updating {id} after {MERGE_ATTEMPTS} concurrent writes"
        )))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let result = Documents::delete_by_id((collection.as_str().to_string(), id.to_string()))
            .exec(&self.conn)
            .await?;

        let removed = result.rows_affected > 0;
        if removed {
            info!(%collection, %id, "Document deleted");
            self.notify(collection);
        }
        Ok(removed)
    }

    async fn list(
        &self,
        collection: Collection,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let rows = Documents::find()
            .filter(documents::Column::Collection.eq(collection.as_str()))
            .order_by_asc(documents::Column::CreatedAt)
            .order_by_asc(documents::Column::Id)
            .all(&self.conn)
            .await?;

        let mut docs = rows
            .into_iter()
            .map(Self::to_document)
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(order) = order {
            sort_documents(&mut docs, order);
        }
        Ok(docs)
    }

    async fn subscribe(&self, collection: Collection) -> Result<Subscription, StoreError> {
        let changes = self.changes.subscribe();
        Ok(snapshot_stream(self.clone(), collection, changes))
    }

    async fn health(&self) -> Result<(), StoreError> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }
}

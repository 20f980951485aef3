use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast};

use super::{
    Collection, Document, DocumentStore, OrderBy, StoreError, Subscription, snapshot_stream,
    sort_documents,
};

/// In-process document store.
///
/// Documents are kept in insertion order per collection. A failure can be
/// injected to make every subsequent call fail, which is how the catalog's
/// error classification is exercised.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
    changes: broadcast::Sender<Collection>,
    failure: Mutex<Option<StoreError>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                changes,
                failure: Mutex::new(None),
            }),
        }
    }

    /// Makes every call fail with `failure` until cleared with `None`.
    /// Active subscribers are woken so they observe the failure.
    pub async fn inject_failure(&self, failure: Option<StoreError>) {
        *self.inner.failure.lock().await = failure;
        for collection in Collection::ALL {
            let _ = self.inner.changes.send(collection);
        }
    }

    async fn check(&self) -> Result<(), StoreError> {
        match self.inner.failure.lock().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn notify(&self, collection: Collection) {
        // No receivers is fine.
        let _ = self.inner.changes.send(collection);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(
        &self,
        collection: Collection,
        mut body: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        self.check().await?;
        body.remove("id");

        let doc = Document {
            id: uuid::Uuid::new_v4().to_string(),
            version: 1,
            body,
        };

        self.inner
            .collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc.clone());

        self.notify(collection);
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.check().await?;
        Ok(self
            .inner
            .collections
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mut patch: Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<Document, StoreError> {
        self.check().await?;
        patch.remove("id");

        let updated = {
            let mut collections = self.inner.collections.write().await;
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| StoreError::NotFound {
                    collection,
                    id: id.to_string(),
                })?;

            if let Some(expected) = expected_version
                && expected != doc.version
            {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: doc.version,
                });
            }

            doc.body.extend(patch);
            doc.version += 1;
            doc.clone()
        };

        self.notify(collection);
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.check().await?;

        let removed = {
            let mut collections = self.inner.collections.write().await;
            collections.get_mut(&collection).is_some_and(|docs| {
                let before = docs.len();
                docs.retain(|d| d.id != id);
                docs.len() != before
            })
        };

        if removed {
            self.notify(collection);
        }
        Ok(removed)
    }

    async fn list(
        &self,
        collection: Collection,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        self.check().await?;

        let mut docs = self
            .inner
            .collections
            .read()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default();

        if let Some(order) = order {
            sort_documents(&mut docs, order);
        }
        Ok(docs)
    }

    async fn subscribe(&self, collection: Collection) -> Result<Subscription, StoreError> {
        self.check().await?;
        let changes = self.inner.changes.subscribe();
        Ok(snapshot_stream(self.clone(), collection, changes))
    }

    async fn health(&self) -> Result<(), StoreError> {
        self.check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn update_merges_and_bumps_version() {
        let store = MemoryStore::new();
        let doc = store
            .create(Collection::Titles, body(json!({ "name": "A", "rating": 5 })))
            .await
            .unwrap();

        let updated = store
            .update(
                Collection::Titles,
                &doc.id,
                body(json!({ "rating": 7 })),
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.body["name"], json!("A"));
        assert_eq!(updated.body["rating"], json!(7));
    }

    #[tokio::test]
    async fn conditional_update_detects_stale_versions() {
        let store = MemoryStore::new();
        let doc = store
            .create(Collection::Titles, body(json!({ "trending": false })))
            .await
            .unwrap();

        store
            .update(
                Collection::Titles,
                &doc.id,
                body(json!({ "trending": true })),
                Some(1),
            )
            .await
            .unwrap();

        let err = store
            .update(
                Collection::Titles,
                &doc.id,
                body(json!({ "trending": false })),
                Some(1),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::Conflict {
                id: doc.id.clone(),
                expected: 1,
                actual: 2
            }
        );
    }

    #[tokio::test]
    async fn subscription_delivers_snapshot_then_changes() {
        let store = MemoryStore::new();
        store
            .create(Collection::Titles, body(json!({ "name": "A" })))
            .await
            .unwrap();

        let mut sub = store.subscribe(Collection::Titles).await.unwrap();
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        store
            .create(Collection::Movies, body(json!({ "title": "M" })))
            .await
            .unwrap();
        store
            .create(Collection::Titles, body(json!({ "name": "B" })))
            .await
            .unwrap();

        let second = sub.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_reach_every_call() {
        let store = MemoryStore::new();
        store
            .inject_failure(Some(StoreError::PermissionDenied("rules".into())))
            .await;

        assert!(matches!(
            store.list(Collection::Titles, None).await,
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(store.subscribe(Collection::Titles).await.is_err());

        store.inject_failure(None).await;
        assert!(store.health().await.is_ok());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let doc = store
            .create(Collection::Movies, body(json!({ "title": "M" })))
            .await
            .unwrap();

        assert!(store.delete(Collection::Movies, &doc.id).await.unwrap());
        assert!(!store.delete(Collection::Movies, &doc.id).await.unwrap());
    }
}

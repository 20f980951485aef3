//! The document-store contract the catalog is built on.
//!
//! A store holds JSON documents grouped in collections. Besides single
//! document CRUD it offers a live subscription that delivers the full
//! collection snapshot after every write, and conditional updates keyed on a
//! per-document version.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::DateTime;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::SortOrder;

/// Collections used by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Titles,
    Movies,
}

impl Collection {
    pub const ALL: [Self; 2] = [Self::Titles, Self::Movies];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Titles => "titles",
            Self::Movies => "movies",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Document {id} not found in {collection}")]
    NotFound { collection: Collection, id: String },

    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: i64,
        actual: i64,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A stored document. `body` never contains the `id` key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: i64,
    pub body: Map<String, Value>,
}

impl Document {
    /// Deserializes the document, injecting its id as the `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut body = self.body.clone();
        body.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(body))?)
    }
}

/// Serializes a value into a document body, dropping any `id` field.
pub fn encode_body<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Ordering for one-shot list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub order: SortOrder,
}

impl OrderBy {
    #[must_use]
    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }

    #[must_use]
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }
}

/// Live stream of full collection snapshots.
pub type Subscription = BoxStream<'static, Result<Vec<Document>, StoreError>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document under a freshly generated id.
    async fn create(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> Result<Document, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merges `patch` into the top level of the document body.
    ///
    /// With `expected_version` set the write only happens if the stored
    /// version still matches, otherwise [`StoreError::Conflict`] is returned.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
        expected_version: Option<i64>,
    ) -> Result<Document, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn list(
        &self,
        collection: Collection,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Subscribes to a collection. The current snapshot is delivered first.
    async fn subscribe(&self, collection: Collection) -> Result<Subscription, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;
}

/// Builds a snapshot subscription from a change feed.
///
/// `changes` must be subscribed before calling so that no write between the
/// initial snapshot and the first notification is lost. A lagged receiver
/// simply triggers a fresh snapshot.
pub(crate) fn snapshot_stream<S>(
    store: S,
    collection: Collection,
    changes: broadcast::Receiver<Collection>,
) -> Subscription
where
    S: DocumentStore + Clone + 'static,
{
    stream::unfold(
        (store, changes, true),
        move |(store, mut changes, first)| async move {
            if !first {
                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == collection => break,
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(%collection, skipped, "Change feed lagged, resyncing");
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }

            let snapshot = store.list(collection, None).await;
            Some((snapshot, (store, changes, false)))
        },
    )
    .boxed()
}

/// Sorts documents by a top-level body field. RFC 3339 strings compare as
/// instants, numbers numerically, other strings lexicographically. Documents
/// missing the field sort first in ascending order.
pub fn sort_documents(docs: &mut [Document], order: OrderBy) {
    docs.sort_by(|a, b| {
        let ordering = compare_fields(a.body.get(order.field), b.body.get(order.field));
        if order.order.is_ascending() {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&b.as_f64().unwrap_or_default()),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, body: Value) -> Document {
        Document {
            id: id.to_string(),
            version: 1,
            body: body.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn decode_injects_the_id() {
        #[derive(serde::Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let named: Named = doc("x1", json!({ "name": "Bleach" })).decode().unwrap();
        assert_eq!(named.id, "x1");
        assert_eq!(named.name, "Bleach");
    }

    #[test]
    fn encode_strips_the_id() {
        let body = encode_body(&json!({ "id": "x1", "name": "Bleach" })).unwrap();
        assert!(!body.contains_key("id"));
        assert_eq!(body["name"], json!("Bleach"));
        assert!(encode_body(&json!([1, 2])).is_err());
    }

    #[test]
    fn dates_sort_as_instants() {
        let mut docs = vec![
            doc("a", json!({ "release_date": "2024-01-01T00:00:00Z" })),
            doc("b", json!({ "release_date": "2024-03-01T00:00:00.500Z" })),
            doc("c", json!({ "release_date": "2024-02-01T00:00:00+00:00" })),
        ];
        sort_documents(&mut docs, OrderBy::desc("release_date"));
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn missing_fields_sort_first_ascending() {
        let mut docs = vec![
            doc("a", json!({ "n": 2 })),
            doc("b", json!({})),
            doc("c", json!({ "n": 1 })),
        ];
        sort_documents(&mut docs, OrderBy::asc("n"));
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }
}

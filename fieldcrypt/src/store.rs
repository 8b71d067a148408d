//! Storage collaborator contract.
//!
//! The engine never performs I/O. A storage-facing service (see
//! [`EncryptedCollection`](crate::collection::EncryptedCollection)) runs it
//! immediately before writes and immediately after reads against any
//! backend implementing [`DocumentStore`].

use crate::dynamic::Document;
use crate::error::StoreError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// Name of the primary key field.
pub const ID_FIELD: &str = "_id";

/// A document database seen as named collections of documents.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait DocumentStore: Send + Sync {
    /// Inserts `doc` into `collection`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be reached.
    fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    /// Returns every document of `collection` matching `filter`.
    ///
    /// A document matches when each filter entry equals the document's field
    /// of the same name. An entry of the form `{"$in": [..]}` matches if the
    /// field equals any listed value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the backend cannot be reached.
    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>, StoreError>;

    /// Sets every field of `partial` on the document whose `_id` equals `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no document has that id.
    fn update_by_id(&self, collection: &str, id: &Value, partial: Document) -> Result<(), StoreError>;
}

/// In-process document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw stored documents of `collection`, as persisted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the lock is poisoned.
    pub fn raw_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

fn condition_matches(condition: &Value, actual: Option<&Value>) -> bool {
    if let Value::Object(operator) = condition {
        if let (1, Some(Value::Array(choices))) = (operator.len(), operator.get("$in")) {
            return actual.is_some_and(|value| choices.contains(value));
        }
    }
    actual == Some(condition)
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(field, condition)| condition_matches(condition, doc.get(field)))
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        collections.entry(collection.to_string()).or_default().push(doc);
        drop(collections);
        Ok(())
    }

    fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        let found: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| matches(doc, filter)).cloned().collect())
            .unwrap_or_default();
        drop(collections);
        Ok(found)
    }

    fn update_by_id(&self, collection: &str, id: &Value, partial: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let target = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.get(ID_FIELD) == Some(id)))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        for (field, value) in partial {
            target.insert(field, value);
        }
        drop(collections);
        Ok(())
    }
}

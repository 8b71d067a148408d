//! Storage-facing service that encrypts before writes and decrypts after reads.

use crate::dynamic::Document;
use crate::engine::FieldEngine;
use crate::error::{Error, StoreError};
use crate::store::{DocumentStore, ID_FIELD};
use crate::typed::Encryptable;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One named collection of a [`DocumentStore`], with field encryption applied
/// on every write and read.
///
/// # Example
///
/// ```
/// use fieldcrypt::prelude::*;
/// use serde_json::json;
///
/// let engine = FieldEngine::from_passphrase("passphrase").unwrap();
/// let users = EncryptedCollection::new(engine, MemoryStore::new(), "users");
///
/// let doc = json!({"_id": "u1", "email": "a@b.com"});
/// users.save(doc.as_object().cloned().unwrap()).unwrap();
///
/// let filter = json!({"email": "a@b.com"});
/// let found = users.find(filter.as_object().cloned().unwrap()).unwrap();
/// assert_eq!(found[0]["email"], json!("a@b.com"));
/// ```
#[derive(Debug)]
pub struct EncryptedCollection<S: DocumentStore> {
    engine: FieldEngine,
    store: S,
    name: String,
}

impl<S: DocumentStore> EncryptedCollection<S> {
    /// Creates a service for collection `name` of `store`.
    pub fn new(engine: FieldEngine, store: S, name: impl Into<String>) -> Self {
        Self { engine, store, name: name.into() }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Encrypts `doc` by policy and inserts it.
    ///
    /// # Errors
    ///
    /// Returns the traversal error (nothing is written) or `Error::Store`.
    pub fn save(&self, mut doc: Document) -> Result<(), Error> {
        self.engine.encrypt_by_policy(&mut doc)?;
        self.store.insert(&self.name, doc)?;
        Ok(())
    }

    /// Finds documents by plaintext equality and returns them decrypted.
    ///
    /// Stored documents that cannot be decrypted are left out of the result.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the query fails.
    pub fn find(&self, mut filter: Document) -> Result<Vec<Document>, Error> {
        self.engine.rewrite_filter_to_fingerprints(&mut filter);
        let stored = self.store.find(&self.name, &filter)?;

        let total = stored.len();
        let mut found = Vec::with_capacity(total);
        for mut doc in stored {
            match self.engine.decrypt_by_policy(&mut doc) {
                Ok(()) => found.push(doc),
                Err(err) => tracing::warn!(
                    collection = %self.name,
                    id = ?doc.get(ID_FIELD),
                    error = %err,
                    "dropping document that failed to decrypt"
                ),
            }
        }

        tracing::debug!(collection = %self.name, total, returned = found.len(), "find");
        Ok(found)
    }

    /// Applies a partial update to the document named by the `_id` field of
    /// `doc`. The remaining fields are encrypted by policy first.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidFormat` if `doc` has no `_id`, the traversal
    /// error, or `Error::Store` (including `NotFound`).
    pub fn edit(&self, mut doc: Document) -> Result<(), Error> {
        let id = doc
            .remove(ID_FIELD)
            .ok_or_else(|| Error::InvalidFormat(format!("update requires an {ID_FIELD} field")))?;

        self.engine.encrypt_by_policy(&mut doc)?;
        self.store.update_by_id(&self.name, &id, doc)?;
        Ok(())
    }

    /// Encrypts the marked fields of `record` and inserts it.
    ///
    /// # Errors
    ///
    /// Returns the traversal error, `StoreError::Serialization` if the
    /// record does not serialize to an object, or another `Error::Store`.
    pub fn insert_record<T>(&self, record: &T) -> Result<(), Error>
    where
        T: Encryptable + Serialize + Clone,
    {
        let mut sealed = record.clone();
        self.engine.encrypt_struct_fields(&mut sealed)?;

        let doc = match serde_json::to_value(&sealed).map_err(StoreError::from)? {
            Value::Object(doc) => doc,
            other => {
                return Err(StoreError::Serialization(format!(
                    "record serialized to a non-object value: {other}"
                ))
                .into())
            }
        };
        self.store.insert(&self.name, doc)?;
        Ok(())
    }

    /// Finds records matching `filter` as stored and returns them decrypted.
    ///
    /// Unmarked fields are stored in plaintext, so `filter` is passed to the
    /// store unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the query or deserialization fails, or the
    /// first decryption error.
    pub fn find_records<T>(&self, filter: &Document) -> Result<Vec<T>, Error>
    where
        T: Encryptable + DeserializeOwned,
    {
        self.store
            .find(&self.name, filter)?
            .into_iter()
            .map(|doc| {
                let mut record: T =
                    serde_json::from_value(Value::Object(doc)).map_err(StoreError::from)?;
                self.engine.decrypt_struct_fields_in_place(&mut record)?;
                Ok(record)
            })
            .collect()
    }
}

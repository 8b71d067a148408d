//! Field encryption for arbitrarily shaped documents.
//!
//! Every top-level string field of a document is encrypted on write and
//! gets a companion `<field>_hash` fingerprint. Queries are rewritten to
//! match on those fingerprints, and reads decrypt envelopes and drop the
//! companions again:
//!
//! ```text
//! write  {"email": "a@b.com"}   -> {"email": "AES256:...", "email_hash": "fb98d4..."}
//! query  {"email": "a@b.com"}   -> {"email_hash": "fb98d4..."}
//! read   {"email": "AES256:...", "email_hash": "fb98d4..."} -> {"email": "a@b.com"}
//! ```
//!
//! A request may carry an `ignore_encryption` control field (an object
//! whose keys, or an array whose strings, name exempt fields). Exempt
//! fields stay plaintext and unindexed; the control field itself is removed
//! before the document reaches storage. Fields already ending in `_hash`
//! are never encrypted or fingerprinted. Nested objects, arrays and
//! non-string scalars pass through unchanged.

use crate::engine::FieldEngine;
use crate::envelope::is_envelope;
use crate::error::Error;
use serde_json::Value;
use std::collections::HashSet;

/// A keyed document as exchanged with the document store.
pub type Document = serde_json::Map<String, Value>;

/// Suffix of fingerprint companion fields.
pub const HASH_SUFFIX: &str = "_hash";

/// Name of the per-request exemption control field.
pub const IGNORE_FIELD: &str = "ignore_encryption";

/// Returns the companion fingerprint field name for `field`.
#[must_use]
pub fn hash_field_name(field: &str) -> String {
    format!("{field}{HASH_SUFFIX}")
}

/// Field names exempted from encryption for a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet(HashSet<String>);

impl IgnoreSet {
    /// Reads the exemption set from an `ignore_encryption` value.
    ///
    /// Objects contribute their keys, arrays their string elements. Any
    /// other shape yields an empty set.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let names = match value {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).map(str::to_owned).collect()
            }
            _ => HashSet::new(),
        };
        Self(names)
    }

    /// Reads the exemption set of `doc` without removing it.
    #[must_use]
    pub fn of(doc: &Document) -> Self {
        Self::from_value(doc.get(IGNORE_FIELD))
    }

    /// Returns `true` if `field` is exempt.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Returns `true` if no field is exempt.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Top-level string fields that take part in encryption and fingerprinting.
fn eligible_fields(doc: &Document, ignore: &IgnoreSet) -> Vec<String> {
    doc.iter()
        .filter(|(field, value)| {
            value.is_string()
                && field.as_str() != IGNORE_FIELD
                && !field.ends_with(HASH_SUFFIX)
                && !ignore.contains(field)
        })
        .map(|(field, _)| field.clone())
        .collect()
}

impl FieldEngine {
    /// Encrypts and fingerprints every eligible field of `doc`.
    ///
    /// For each eligible field `f`, `f` is replaced by its envelope and
    /// `f_hash` is set to the fingerprint of the plaintext. Values already
    /// carrying a scheme tag follow the engine's
    /// [`ReencryptPolicy`](crate::engine::ReencryptPolicy); skipped values
    /// keep their existing companion. `ignore_encryption` is removed.
    ///
    /// # Errors
    ///
    /// Returns the first codec error. `doc` is left unmodified in that case.
    pub fn encrypt_by_policy(&self, doc: &mut Document) -> Result<(), Error> {
        let ignore = IgnoreSet::of(doc);
        let fields = eligible_fields(doc, &ignore);

        let mut sealed = Vec::with_capacity(fields.len());
        let mut skipped = 0usize;
        for field in fields {
            let Some(Value::String(plaintext)) = doc.get(&field) else { continue };
            let Some(envelope) = self.encrypt_leaf(&field, plaintext)? else {
                skipped += 1;
                continue;
            };
            let digest = self.fingerprint(plaintext);
            sealed.push((field, envelope, digest));
        }

        tracing::debug!(
            fields = doc.len(),
            sealed = sealed.len(),
            skipped,
            ignored = !ignore.is_empty(),
            "encrypted document fields"
        );

        doc.remove(IGNORE_FIELD);
        for (field, envelope, digest) in sealed {
            doc.insert(hash_field_name(&field), Value::String(digest));
            doc.insert(field, Value::String(envelope));
        }
        Ok(())
    }

    /// Decrypts every envelope-valued field of `doc` and strips fingerprints.
    ///
    /// For every field `f` present in the document, `f_hash` is removed.
    /// String fields without a scheme tag are returned as stored.
    ///
    /// # Errors
    ///
    /// Returns the first codec error. `doc` is left unmodified in that case.
    pub fn decrypt_by_policy(&self, doc: &mut Document) -> Result<(), Error> {
        let mut opened = Vec::new();
        for (field, value) in doc.iter() {
            if let Value::String(envelope) = value {
                if is_envelope(envelope) {
                    opened.push((field.clone(), self.decrypt(envelope)?));
                }
            }
        }

        let companions: Vec<String> = doc.keys().map(|field| hash_field_name(field)).collect();
        let mut stripped = 0usize;
        for companion in &companions {
            if doc.remove(companion).is_some() {
                stripped += 1;
            }
        }

        tracing::debug!(opened = opened.len(), stripped, "decrypted document fields");

        for (field, plaintext) in opened {
            doc.insert(field, Value::String(plaintext));
        }
        Ok(())
    }

    /// Rewrites a plaintext equality filter into a fingerprint filter.
    ///
    /// Each eligible field `f` is removed and replaced by
    /// `f_hash = fingerprint(value)`. Exempt fields, `_hash` fields and
    /// non-string conditions (such as `{"$in": [...]}`) are kept as given.
    /// `ignore_encryption` is removed.
    pub fn rewrite_filter_to_fingerprints(&self, filter: &mut Document) {
        let ignore = IgnoreSet::of(filter);
        filter.remove(IGNORE_FIELD);

        let fields = eligible_fields(filter, &ignore);
        tracing::debug!(rewritten = fields.len(), "rewrote filter to fingerprints");

        for field in fields {
            if let Some(Value::String(value)) = filter.remove(&field) {
                filter.insert(hash_field_name(&field), Value::String(self.fingerprint(&value)));
            }
        }
    }
}

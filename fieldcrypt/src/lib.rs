//! # `fieldcrypt`
//!
//! Field-level encryption for records stored in a document database.
//! Sensitive values are sealed into self-describing envelopes before they
//! are written, and dynamic documents carry deterministic fingerprints so
//! the encrypted values can still be looked up by plaintext equality.
//!
//! ## Features
//!
//! - AES-256-CFB envelopes (`AES256:` + base64), plus an authenticated
//!   AES-256-GCM mode (`AES256GCM:`)
//! - Typed records with a derived encryption schema (`#[derive(Encryptable)]`)
//! - Schema-less documents with `<field>_hash` fingerprints and per-request
//!   exemptions (`ignore_encryption`)
//! - Query rewriting from plaintext filters to fingerprint filters
//! - Optional keyed (HMAC) fingerprints
//!
//! ## Example
//!
//! ```rust
//! use fieldcrypt::prelude::*;
//! use serde_json::json;
//!
//! let engine = FieldEngine::from_passphrase("correct horse battery staple").unwrap();
//!
//! let mut doc = json!({"email": "a@b.com", "age": 17}).as_object().cloned().unwrap();
//! engine.encrypt_by_policy(&mut doc).unwrap();
//! assert!(doc["email"].as_str().unwrap().starts_with("AES256:"));
//!
//! let mut filter = json!({"email": "a@b.com"}).as_object().cloned().unwrap();
//! engine.rewrite_filter_to_fingerprints(&mut filter);
//! assert_eq!(filter["email_hash"], doc["email_hash"]);
//!
//! engine.decrypt_by_policy(&mut doc).unwrap();
//! assert_eq!(doc["email"], json!("a@b.com"));
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

// Lets `#[derive(Encryptable)]` expand to `::fieldcrypt::...` paths inside this crate too.
extern crate self as fieldcrypt;

pub mod collection;
pub mod config;
pub mod dynamic;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod key;
pub mod store;
pub mod token;
pub mod typed;

pub use error::{Error, Result};
pub use fieldcrypt_derive::Encryptable;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::collection::EncryptedCollection;
    pub use crate::config::Settings;
    pub use crate::dynamic::{Document, IgnoreSet};
    pub use crate::engine::{FieldEngine, ReencryptPolicy};
    pub use crate::envelope::CipherMode;
    pub use crate::error::{Error, StoreError};
    pub use crate::fingerprint::Fingerprinter;
    pub use crate::key::KeyMaterial;
    pub use crate::store::{DocumentStore, MemoryStore};
    pub use crate::typed::{EncryptedField, Encryptable, FieldDescriptor, FieldVisitor};
    pub use fieldcrypt_derive::Encryptable;
}

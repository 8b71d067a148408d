//! The field engine: key, cipher mode, fingerprinter and re-encryption policy.
//!
//! A `FieldEngine` is built once at startup and handed (by reference or
//! clone) to every component that encrypts, decrypts or fingerprints. It
//! holds no mutable state, so concurrent use from many request handlers
//! needs no locking. Cloning is cheap: the key is shared behind an `Arc`.

use crate::envelope::{self, CipherMode};
use crate::error::Error;
use crate::fingerprint::Fingerprinter;
use crate::key::KeyMaterial;
use serde::Deserialize;
use std::sync::Arc;

/// What the traversal engines do with a value that already carries a scheme tag.
///
/// The policy is shared by the typed and dynamic engines. The bare
/// [`FieldEngine::encrypt`] always rejects such values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReencryptPolicy {
    /// Leave the value (and, for documents, its fingerprint) untouched.
    Skip,
    /// Abort the traversal with `Error::AlreadyEncrypted`.
    Reject,
}

impl Default for ReencryptPolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Encryption engine for single values, typed records and documents.
///
/// # Example
///
/// ```
/// use fieldcrypt::engine::{FieldEngine, ReencryptPolicy};
///
/// let engine = FieldEngine::from_passphrase("passphrase")
///     .unwrap()
///     .with_reencrypt_policy(ReencryptPolicy::Reject);
///
/// let envelope = engine.encrypt("alice@example.com").unwrap();
/// assert_eq!(engine.decrypt(&envelope).unwrap(), "alice@example.com");
/// ```
#[derive(Debug, Clone)]
pub struct FieldEngine {
    key: Arc<KeyMaterial>,
    cipher_mode: CipherMode,
    fingerprinter: Fingerprinter,
    reencrypt_policy: ReencryptPolicy,
}

impl FieldEngine {
    /// Creates an engine with the default cipher mode, plain fingerprints
    /// and the `Skip` re-encryption policy.
    #[must_use]
    pub fn new(key: KeyMaterial) -> Self {
        Self {
            key: Arc::new(key),
            cipher_mode: CipherMode::default(),
            fingerprinter: Fingerprinter::new(),
            reencrypt_policy: ReencryptPolicy::default(),
        }
    }

    /// Derives the key from `passphrase` and creates a default engine.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the passphrase is empty.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, Error> {
        KeyMaterial::from_passphrase(passphrase).map(Self::new)
    }

    /// Sets the cipher mode used for new envelopes.
    #[must_use]
    pub const fn with_cipher_mode(mut self, cipher_mode: CipherMode) -> Self {
        self.cipher_mode = cipher_mode;
        self
    }

    /// Sets the fingerprint generator.
    #[must_use]
    pub fn with_fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Sets the re-encryption policy for both traversal engines.
    #[must_use]
    pub const fn with_reencrypt_policy(mut self, reencrypt_policy: ReencryptPolicy) -> Self {
        self.reencrypt_policy = reencrypt_policy;
        self
    }

    /// Returns the cipher mode.
    #[must_use]
    pub const fn cipher_mode(&self) -> CipherMode {
        self.cipher_mode
    }

    /// Returns the fingerprint generator.
    #[must_use]
    pub const fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Returns the re-encryption policy.
    #[must_use]
    pub const fn reencrypt_policy(&self) -> ReencryptPolicy {
        self.reencrypt_policy
    }

    /// Encrypts a single value.
    ///
    /// # Errors
    ///
    /// See [`envelope::encrypt`].
    pub fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        envelope::encrypt(&self.key, self.cipher_mode, plaintext)
    }

    /// Decrypts a single envelope.
    ///
    /// # Errors
    ///
    /// See [`envelope::decrypt`].
    pub fn decrypt(&self, envelope: &str) -> Result<String, Error> {
        envelope::decrypt(&self.key, envelope)
    }

    /// Computes the fingerprint of a single value.
    #[must_use]
    pub fn fingerprint(&self, value: &str) -> String {
        self.fingerprinter.fingerprint(value)
    }

    /// Encrypts a traversal leaf under the re-encryption policy.
    ///
    /// Returns `Ok(None)` when the value is already an envelope under this
    /// engine's key and the policy is `Skip`. A tagged value that does not
    /// open is rejected with `Error::InvalidFormat`, so it is never stored
    /// as is.
    pub(crate) fn encrypt_leaf(&self, field: &str, plaintext: &str) -> Result<Option<String>, Error> {
        match self.encrypt(plaintext) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(Error::AlreadyEncrypted) if self.reencrypt_policy == ReencryptPolicy::Skip => {
                if self.decrypt(plaintext).is_err() {
                    return Err(Error::InvalidFormat(format!(
                        "field {field} carries a scheme tag but is not a valid envelope"
                    )));
                }
                tracing::warn!(field, "skipping value that is already encrypted");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

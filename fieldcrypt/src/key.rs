//! Process key derivation.
//!
//! The symmetric key is derived once from the configured passphrase as the
//! first 32 bytes of its SHA-512 digest. There is no salt and no stretching:
//! the same passphrase must yield the same key on every start, otherwise
//! stored envelopes become unreadable.

use crate::error::Error;
use secrecy::{ExposeSecret, SecretVec};
use sha2::{Digest, Sha512};
use std::fmt;
use zeroize::Zeroizing;

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// The single active symmetric key.
///
/// Immutable after construction. Share it behind an `Arc` (see
/// [`FieldEngine`](crate::engine::FieldEngine)); the bytes are zeroized on drop.
pub struct KeyMaterial {
    key: SecretVec<u8>,
}

impl KeyMaterial {
    /// Derives the key from `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the passphrase is empty. This is a
    /// startup failure and callers should not retry it.
    ///
    /// # Example
    ///
    /// ```
    /// use fieldcrypt::key::KeyMaterial;
    ///
    /// let key = KeyMaterial::from_passphrase("correct horse battery staple").unwrap();
    /// assert!(KeyMaterial::from_passphrase("").is_err());
    /// # drop(key);
    /// ```
    pub fn from_passphrase(passphrase: &str) -> Result<Self, Error> {
        if passphrase.is_empty() {
            return Err(Error::Configuration("encryption passphrase is empty".to_string()));
        }

        let mut digest = Zeroizing::new([0u8; 64]);
        digest.copy_from_slice(&Sha512::digest(passphrase.as_bytes()));

        Ok(Self { key: SecretVec::new(digest[..KEY_SIZE].to_vec()) })
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.key.expose_secret()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").field("key", &"[REDACTED]").finish()
    }
}

//! Deterministic fingerprints for equality search over encrypted fields.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of the raw UTF-8 bytes
//! of a value. It is stored unencrypted next to the envelope and is the only
//! queryable trace of the value. Anyone holding a candidate plaintext can
//! recompute it, so fingerprints confirm guesses; they never hide low-entropy
//! values such as phone numbers. A configured pepper turns the digest into
//! `HMAC-SHA256(pepper, value)`, which limits guessing to pepper holders.

use crate::error::Error;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Computes the plain SHA-256 fingerprint of `value`.
///
/// # Example
///
/// ```
/// use fieldcrypt::fingerprint::fingerprint;
///
/// assert_eq!(fingerprint("a@b.com"), fingerprint("a@b.com"));
/// assert_ne!(fingerprint("a@b.com"), fingerprint("A@b.com"));
/// ```
#[must_use]
pub fn fingerprint(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Fingerprint generator, optionally keyed with a pepper.
#[derive(Clone, Default)]
pub struct Fingerprinter {
    keyed: Option<HmacSha256>,
}

impl Fingerprinter {
    /// Creates an unkeyed generator producing plain SHA-256 fingerprints.
    #[must_use]
    pub const fn new() -> Self {
        Self { keyed: None }
    }

    /// Creates a generator producing `HMAC-SHA256(pepper, value)` fingerprints.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the pepper is empty.
    pub fn with_pepper(pepper: &[u8]) -> Result<Self, Error> {
        if pepper.is_empty() {
            return Err(Error::Configuration("fingerprint pepper is empty".to_string()));
        }

        let mac = HmacSha256::new_from_slice(pepper)
            .map_err(|e| Error::Configuration(format!("invalid fingerprint pepper: {e}")))?;

        Ok(Self { keyed: Some(mac) })
    }

    /// Returns `true` if a pepper is configured.
    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        self.keyed.is_some()
    }

    /// Computes the fingerprint of `value`.
    #[must_use]
    pub fn fingerprint(&self, value: &str) -> String {
        match &self.keyed {
            None => fingerprint(value),
            Some(prototype) => {
                let mut mac = prototype.clone();
                mac.update(value.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
        }
    }
}

impl fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerprinter").field("keyed", &self.is_keyed()).finish()
    }
}

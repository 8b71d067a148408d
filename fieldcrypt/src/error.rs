//! Error types for `fieldcrypt` operations.

use std::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for `fieldcrypt` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid startup configuration (e.g. no passphrase).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The value already carries a scheme tag and was submitted for encryption again
    #[error("value is already encrypted")]
    AlreadyEncrypted,

    /// The value is not a well-formed envelope
    #[error("invalid encrypted format: {0}")]
    InvalidFormat(String),

    /// The OS random source could not supply IV entropy
    #[error("secure random source unavailable: {0}")]
    SecureRandomUnavailable(String),

    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption operation failed (authenticated envelopes only)
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Storage collaborator failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// A fixed message that is safe to return to API callers.
    ///
    /// Internal detail (cipher names, lengths, decode positions) never
    /// reaches the response body.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "service misconfigured",
            Self::AlreadyEncrypted
            | Self::SecureRandomUnavailable(_)
            | Self::EncryptionFailed(_) => "encryption failed",
            Self::InvalidFormat(_) | Self::DecryptionFailed(_) => "decryption failed",
            Self::Store(_) => "storage error",
        }
    }
}

/// Errors reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug)]
pub enum StoreError {
    /// No document matched the given id
    NotFound(String),

    /// The record could not be converted to or from a document
    Serialization(String),

    /// The backend is unreachable or poisoned
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "no document with id {id}"),
            Self::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            Self::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

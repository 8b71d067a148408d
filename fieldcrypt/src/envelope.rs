//! Ciphertext envelopes for single string values.
//!
//! An envelope is a self-describing string:
//!
//! ```text
//! AES256:<base64(iv[16] || aes256_cfb(plaintext))>
//! AES256GCM:<base64(nonce[12] || aes256_gcm(plaintext) || tag[16])>
//! ```
//!
//! The `AES256` scheme is the storage format of existing records and carries
//! no authentication tag: a modified envelope decrypts to modified plaintext
//! without any error. `AES256GCM` is the authenticated alternative. Both
//! draw a fresh IV from the OS random source on every call, so encrypting the
//! same value twice never yields the same envelope.

use crate::error::Error;
use crate::key::KeyMaterial;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::Deserialize;
use zeroize::Zeroize;

/// Scheme tag prefix of unauthenticated AES-256-CFB envelopes.
pub const CFB_PREFIX: &str = "AES256:";

/// Scheme tag prefix of authenticated AES-256-GCM envelopes.
pub const GCM_PREFIX: &str = "AES256GCM:";

/// IV size for AES-256-CFB (one AES block).
pub const IV_SIZE: usize = 16;

/// Nonce size for AES-256-GCM (96 bits).
pub const GCM_NONCE_SIZE: usize = 12;

const GCM_TAG_SIZE: usize = 16;

type Aes256CfbEnc = cfb_mode::Encryptor<aes::Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<aes::Aes256>;

/// Cipher mode used for new envelopes.
///
/// Decryption always dispatches on the envelope's own tag, so switching the
/// mode does not strand previously written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CipherMode {
    /// AES-256-CFB, `AES256:` envelopes (default).
    #[serde(rename = "aes256")]
    Aes256Cfb,
    /// AES-256-GCM, `AES256GCM:` envelopes.
    #[serde(rename = "aes256gcm")]
    Aes256Gcm,
}

impl Default for CipherMode {
    fn default() -> Self {
        Self::Aes256Cfb
    }
}

impl CipherMode {
    /// Envelope prefix written by this mode.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Aes256Cfb => CFB_PREFIX,
            Self::Aes256Gcm => GCM_PREFIX,
        }
    }
}

/// Returns `true` if `value` carries any known scheme tag.
#[must_use]
pub fn is_envelope(value: &str) -> bool {
    value.starts_with(CFB_PREFIX) || value.starts_with(GCM_PREFIX)
}

/// Encrypts `plaintext` into a new envelope.
///
/// # Errors
///
/// - `Error::AlreadyEncrypted` if `plaintext` already carries a scheme tag
/// - `Error::SecureRandomUnavailable` if no IV entropy could be obtained
/// - `Error::EncryptionFailed` if the cipher cannot be initialized
///
/// # Example
///
/// ```
/// use fieldcrypt::envelope::{decrypt, encrypt, CipherMode};
/// use fieldcrypt::key::KeyMaterial;
///
/// let key = KeyMaterial::from_passphrase("passphrase").unwrap();
/// let envelope = encrypt(&key, CipherMode::default(), "alice@example.com").unwrap();
///
/// assert!(envelope.starts_with("AES256:"));
/// assert_eq!(decrypt(&key, &envelope).unwrap(), "alice@example.com");
/// ```
pub fn encrypt(key: &KeyMaterial, mode: CipherMode, plaintext: &str) -> Result<String, Error> {
    if is_envelope(plaintext) {
        return Err(Error::AlreadyEncrypted);
    }

    let payload = match mode {
        CipherMode::Aes256Cfb => seal_cfb(key, plaintext.as_bytes())?,
        CipherMode::Aes256Gcm => seal_gcm(key, plaintext.as_bytes())?,
    };

    Ok(format!("{}{}", mode.prefix(), STANDARD.encode(payload)))
}

/// Decrypts an envelope produced by [`encrypt`].
///
/// # Errors
///
/// - `Error::InvalidFormat` if the scheme tag is missing, the base64 is
///   malformed, the payload is shorter than its IV, or the plaintext is not
///   UTF-8
/// - `Error::DecryptionFailed` if an `AES256GCM` envelope fails authentication
pub fn decrypt(key: &KeyMaterial, envelope: &str) -> Result<String, Error> {
    let plaintext = if let Some(encoded) = envelope.strip_prefix(GCM_PREFIX) {
        open_gcm(key, decode(encoded)?)?
    } else if let Some(encoded) = envelope.strip_prefix(CFB_PREFIX) {
        open_cfb(key, decode(encoded)?)?
    } else {
        return Err(Error::InvalidFormat("missing scheme tag".to_string()));
    };

    String::from_utf8(plaintext).map_err(|err| {
        err.into_bytes().zeroize();
        Error::InvalidFormat("decrypted value is not valid UTF-8".to_string())
    })
}

/// Fills `buf` from the OS CSPRNG. There is no fallback source.
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), Error> {
    fill_from(&mut OsRng, buf)
}

fn fill_from<R: RngCore + ?Sized>(rng: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    rng.try_fill_bytes(buf).map_err(|e| Error::SecureRandomUnavailable(e.to_string()))
}

fn decode(encoded: &str) -> Result<Vec<u8>, Error> {
    STANDARD.decode(encoded).map_err(|e| Error::InvalidFormat(format!("base64 decode failed: {e}")))
}

fn seal_cfb(key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

    let mut payload = vec![0u8; IV_SIZE + plaintext.len()];
    let (iv, body) = payload.split_at_mut(IV_SIZE);
    fill_random(iv)?;
    body.copy_from_slice(plaintext);

    Aes256CfbEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| Error::EncryptionFailed("invalid AES-256 key or IV length".to_string()))?
        .encrypt(body);

    Ok(payload)
}

fn open_cfb(key: &KeyMaterial, mut payload: Vec<u8>) -> Result<Vec<u8>, Error> {
    use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

    if payload.len() < IV_SIZE {
        return Err(Error::InvalidFormat(format!(
            "payload is {} bytes, shorter than the {IV_SIZE}-byte IV",
            payload.len()
        )));
    }

    let mut body = payload.split_off(IV_SIZE);
    Aes256CfbDec::new_from_slices(key.as_bytes(), &payload)
        .map_err(|_| Error::DecryptionFailed("invalid AES-256 key or IV length".to_string()))?
        .decrypt(&mut body);

    Ok(body)
}

fn seal_gcm(key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};

    let mut nonce_bytes = [0u8; GCM_NONCE_SIZE];
    fill_random(&mut nonce_bytes)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| Error::EncryptionFailed("invalid AES-256 key length".to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| Error::EncryptionFailed("AES-256-GCM encryption failed".to_string()))?;

    let mut payload = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

fn open_gcm(key: &KeyMaterial, payload: Vec<u8>) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};

    if payload.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
        return Err(Error::InvalidFormat(format!(
            "payload is {} bytes, shorter than nonce and tag",
            payload.len()
        )));
    }

    let (nonce, ciphertext) = payload.split_at(GCM_NONCE_SIZE);
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| Error::DecryptionFailed("invalid AES-256 key length".to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::DecryptionFailed("authentication failed".to_string()))
}

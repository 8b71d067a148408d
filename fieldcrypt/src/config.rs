//! Engine settings loaded from environment variables.
//!
//! | Variable              | Required | Default  |
//! |-----------------------|----------|----------|
//! | `DATABASE_ENCRYPTION` | yes      |          |
//! | `FINGERPRINT_PEPPER`  | no       | unset    |
//! | `CIPHER_MODE`         | no       | `aes256` |
//! | `REENCRYPT_POLICY`    | no       | `skip`   |
//! | `LOG_LEVEL`           | no       | `info`   |

use crate::engine::{FieldEngine, ReencryptPolicy};
use crate::envelope::CipherMode;
use crate::error::Error;
use crate::fingerprint::Fingerprinter;
use ::config::{Config, Environment};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Validated engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Passphrase the process key is derived from. **Required.**
    #[serde(default)]
    pub database_encryption: Option<SecretString>,

    /// Enables keyed (HMAC) fingerprints when set.
    #[serde(default)]
    pub fingerprint_pepper: Option<SecretString>,

    /// Cipher mode for new envelopes.
    #[serde(default)]
    pub cipher_mode: CipherMode,

    /// Handling of values that are already encrypted.
    #[serde(default)]
    pub reencrypt_policy: ReencryptPolicy,

    /// Tracing filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Settings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if a value cannot be parsed or the
    /// passphrase is missing or empty.
    pub fn from_env() -> Result<Self, Error> {
        Self::load(Environment::default())
    }

    /// Loads settings from an explicit variable map instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_env`].
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source: ::config::Map<String, String> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::load(Environment::default().source(Some(source)))
    }

    fn load(environment: Environment) -> Result<Self, Error> {
        let cfg = Config::builder()
            .add_source(environment)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to read environment: {e}")))?;

        let settings: Self = cfg
            .try_deserialize()
            .map_err(|e| Error::Configuration(format!("failed to parse settings: {e}")))?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.passphrase().is_empty() {
            return Err(Error::Configuration(
                "DATABASE_ENCRYPTION is required and must not be empty".to_string(),
            ));
        }
        if self.fingerprint_pepper.as_ref().is_some_and(|p| p.expose_secret().is_empty()) {
            return Err(Error::Configuration(
                "FINGERPRINT_PEPPER must not be empty when set".to_string(),
            ));
        }
        Ok(())
    }

    fn passphrase(&self) -> &str {
        self.database_encryption.as_ref().map_or("", |p| p.expose_secret().as_str())
    }

    /// Builds the field engine described by these settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the key or pepper is unusable.
    pub fn build_engine(&self) -> Result<FieldEngine, Error> {
        let mut engine = FieldEngine::from_passphrase(self.passphrase())?
            .with_cipher_mode(self.cipher_mode)
            .with_reencrypt_policy(self.reencrypt_policy);

        if let Some(pepper) = &self.fingerprint_pepper {
            engine = engine.with_fingerprinter(Fingerprinter::with_pepper(
                pepper.expose_secret().as_bytes(),
            )?);
        }

        tracing::info!(
            cipher_mode = ?engine.cipher_mode(),
            keyed_fingerprints = engine.fingerprinter().is_keyed(),
            reencrypt_policy = ?engine.reencrypt_policy(),
            "field engine configured"
        );
        Ok(engine)
    }
}

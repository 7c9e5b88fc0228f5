//! Configuration loading and validation for host integrations.
//!
//! Values are read from `FIELD_CRYPT_*` environment variables. A host calls
//! [`Config::from_env`] once at startup and hands the result to
//! [`crate::EncryptSubscriber::from_config`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::{CipherKind, SharedCipher};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "FIELD_CRYPT";

/// Validated field-encryption configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Cipher backend (`aes-gcm-siv`, `chacha20-poly1305` or `none`).
    #[serde(default = "default_cipher")]
    pub cipher: CipherKind,

    /// Key file location. **Required** unless `cipher` is `none`.
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Fail lifecycle events instead of passing values through when no
    /// cipher is active.
    #[serde(default)]
    pub require_encryption: bool,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_cipher() -> CipherKind {
    CipherKind::AesGcmSiv
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or the combination is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(::config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(env: ::config::Environment) -> Result<Self> {
        let cfg = ::config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build field-crypt configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise field-crypt configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Construct the configured cipher. Its key file is read on first use.
    pub fn build_cipher(&self) -> Option<SharedCipher> {
        self.key_file
            .as_deref()
            .and_then(|path| self.cipher.build(path))
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        let missing_key_file = self
            .key_file
            .as_ref()
            .map_or(true, |p| p.as_os_str().is_empty());

        if self.cipher != CipherKind::None && missing_key_file {
            anyhow::bail!(
                "{ENV_PREFIX}_KEY_FILE is required when {ENV_PREFIX}_CIPHER is {}",
                self.cipher
            );
        }
        if self.cipher == CipherKind::None && self.require_encryption {
            anyhow::bail!(
                "{ENV_PREFIX}_REQUIRE_ENCRYPTION is set but {ENV_PREFIX}_CIPHER is none"
            );
        }
        if self.log_level.trim().is_empty() {
            anyhow::bail!("{ENV_PREFIX}_LOG_LEVEL must not be empty");
        }
        Ok(())
    }
}

//! KMS configuration.
//!
//! [`KmsConfig`] is the user-facing shape (deserializable from any serde
//! format, or loaded from `KEYHOLD_KMS_*` environment variables). Calling
//! [`KmsConfig::initialize`] resolves it once into a [`ResolvedConfig`],
//! which is immutable for the rest of the process.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;
use crate::status::scheme;

/// Top-level KMS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsConfig {
    /// Settings for secret encryption.
    pub secrets: SecretsConfig,
}

/// Settings for secret encryption.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Scheme-prefixed URL selecting the active backend (default `local://`).
    pub url: String,
    /// File containing the master key. Surrounding whitespace is trimmed.
    pub master_key_path: Option<PathBuf>,
    /// Inline master key. Takes precedence over `master_key_path`.
    #[serde(rename = "master_key")]
    pub master_key_string: Option<String>,
}

impl fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("url", &self.url)
            .field("master_key_path", &self.master_key_path)
            .field(
                "master_key",
                &self.master_key_string.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl KmsConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KEYHOLD_KMS_URL`: backend URL (default: `local://`)
    /// - `KEYHOLD_KMS_MASTER_KEY_PATH`: path to a master key file (optional)
    /// - `KEYHOLD_KMS_MASTER_KEY`: inline master key (optional, wins over the path)
    #[must_use]
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            secrets: SecretsConfig {
                url: non_empty("KEYHOLD_KMS_URL").unwrap_or_default(),
                master_key_path: non_empty("KEYHOLD_KMS_MASTER_KEY_PATH").map(PathBuf::from),
                master_key_string: non_empty("KEYHOLD_KMS_MASTER_KEY"),
            },
        }
    }

    /// Resolve the master key and default URL.
    ///
    /// The inline key wins over the key file; the file is only read when no
    /// inline key is set. An empty key (after trimming) counts as no key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MasterKeyRead`] if the key file cannot be read.
    /// No partial configuration is produced in that case.
    pub fn initialize(&self) -> Result<ResolvedConfig, ConfigError> {
        let inline = self
            .secrets
            .master_key_string
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(MasterKey::new);

        let master_key = match (inline, &self.secrets.master_key_path) {
            (Some(key), _) => Some(key),
            (None, Some(path)) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::MasterKeyRead {
                        path: path.clone(),
                        source,
                    })?;
                let trimmed = contents.trim();
                (!trimmed.is_empty()).then(|| MasterKey::new(trimmed))
            }
            (None, None) => None,
        };

        let url = if self.secrets.url.is_empty() {
            format!("{}://", scheme::LOCAL)
        } else {
            self.secrets.url.clone()
        };

        Ok(ResolvedConfig { url, master_key })
    }
}

/// Master key material, zeroized on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(String);

impl MasterKey {
    /// Wrap key material.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw key bytes, for use as a KDF salt.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Configuration after startup resolution.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    url: String,
    master_key: Option<MasterKey>,
}

impl ResolvedConfig {
    /// Build a resolved configuration directly, bypassing file loading.
    #[must_use]
    pub fn new(url: impl Into<String>, master_key: Option<MasterKey>) -> Self {
        Self {
            url: url.into(),
            master_key,
        }
    }

    /// The active backend URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The master key, if one is configured.
    #[must_use]
    pub fn master_key(&self) -> Option<&MasterKey> {
        self.master_key.as_ref()
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::new(format!("{}://", scheme::LOCAL), None)
    }
}

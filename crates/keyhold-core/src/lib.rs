//! Core library for `keyhold`.
//!
//! A [`Secret`] is a thread-safe envelope around one confidential value. The
//! encryption backend (in-process AES-256-GCM or Secretbox, or a remote key
//! management service) is picked at runtime: from the configured URL for new
//! secrets, and from the stored status for secrets loaded from JSON. A
//! [`Kms`] holds the resolved configuration and the [`ProviderRegistry`] and
//! is the factory for all secrets.
//!
//! ```no_run
//! use keyhold_core::{Kms, KmsConfig, ProviderRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let kms = Kms::initialize(&KmsConfig::from_env(), ProviderRegistry::with_defaults())?;
//! let secret = kms.plain_secret("hunter2");
//! secret.encrypt()?;
//! let record = serde_json::to_string(&secret)?;
//!
//! let loaded = kms.secret_from_json(record.as_bytes())?;
//! loaded.decrypt()?;
//! assert_eq!(loaded.payload(), "hunter2");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod kms;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod secret;
pub mod status;

pub use config::{KmsConfig, MasterKey, ResolvedConfig, SecretsConfig};
pub use error::{ConfigError, CryptoError, SecretError, ValidationError};
pub use kms::{Kms, SecretSeed};
pub use provider::{BaseSecret, SecretProvider};
pub use registry::{ProviderRegistry, Registration};
pub use secret::Secret;
pub use status::SecretStatus;

//! AES-256-GCM provider, registered under the `builtin` scheme.

use crate::config::{MasterKey, ResolvedConfig};
use crate::error::SecretError;
use crate::provider::{BaseSecret, SecretProvider};
use crate::status::SecretStatus;

use super::DataKeyCipher;

/// Encrypts in-process with AES-256-GCM. Payload is hex `nonce || ct || tag`.
#[derive(Debug, Clone)]
pub struct BuiltinProvider {
    base: BaseSecret,
    master_key: Option<MasterKey>,
}

impl BuiltinProvider {
    /// Wrap `base`, binding new encryptions to the configured master key.
    #[must_use]
    pub fn new(base: BaseSecret, config: &ResolvedConfig) -> Self {
        Self {
            base,
            master_key: config.master_key().cloned(),
        }
    }

    /// Factory for [`ProviderRegistry`](crate::registry::ProviderRegistry).
    #[must_use]
    pub fn boxed(base: BaseSecret, config: &ResolvedConfig) -> Box<dyn SecretProvider> {
        Box::new(Self::new(base, config))
    }
}

impl SecretProvider for BuiltinProvider {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn encrypt(&mut self) -> Result<(), SecretError> {
        super::seal_with_data_key(
            DataKeyCipher::Aes256Gcm,
            &mut self.base,
            self.master_key.as_ref(),
        )
    }

    fn decrypt(&mut self) -> Result<(), SecretError> {
        super::open_with_data_key(
            DataKeyCipher::Aes256Gcm,
            &mut self.base,
            self.master_key.as_ref(),
        )
    }

    fn is_encrypted(&self) -> bool {
        self.base.status == Some(SecretStatus::Aes256Gcm)
    }

    fn clone_box(&self) -> Box<dyn SecretProvider> {
        Box::new(self.clone())
    }

    fn base(&self) -> &BaseSecret {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseSecret {
        &mut self.base
    }
}

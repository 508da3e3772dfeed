//! Secretbox-style provider, registered under the `local` scheme.
//!
//! Also the fallback for URLs no registered scheme matches.

use crate::config::{MasterKey, ResolvedConfig};
use crate::error::SecretError;
use crate::provider::{BaseSecret, SecretProvider};
use crate::status::SecretStatus;

use super::DataKeyCipher;

/// Encrypts in-process with XChaCha20-Poly1305. Payload is base64
/// `nonce || ct || tag`.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    base: BaseSecret,
    master_key: Option<MasterKey>,
}

impl LocalProvider {
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

impl SecretProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn encrypt(&mut self) -> Result<(), SecretError> {
        super::seal_with_data_key(
            DataKeyCipher::XChaCha20Poly1305,
            &mut self.base,
            self.master_key.as_ref(),
        )
    }

    fn decrypt(&mut self) -> Result<(), SecretError> {
        super::open_with_data_key(
            DataKeyCipher::XChaCha20Poly1305,
            &mut self.base,
            self.master_key.as_ref(),
        )
    }

    fn is_encrypted(&self) -> bool {
        self.base.status == Some(SecretStatus::Secretbox)
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    use super::*;
    use crate::providers::MODE_MASTER_KEY;

    #[test]
    fn encrypt_then_decrypt_restores_plaintext() {
        let config = ResolvedConfig::default();
        let base = BaseSecret::new(Some(SecretStatus::Plain), "p@ssw0rd", "", "");
        let mut provider = LocalProvider::new(base, &config);

        provider.encrypt().unwrap();
        assert!(provider.is_encrypted());
        assert_eq!(provider.status(), Some(SecretStatus::Secretbox));
        assert_eq!(provider.key().len(), 64);
        assert!(BASE64.decode(provider.payload()).is_ok());

        provider.decrypt().unwrap();
        assert!(!provider.is_encrypted());
        assert_eq!(provider.payload(), "p@ssw0rd");
    }

    #[test]
    fn encrypt_twice_is_wrong_status() {
        let config = ResolvedConfig::default();
        let base = BaseSecret::new(Some(SecretStatus::Plain), "x", "", "");
        let mut provider = LocalProvider::new(base, &config);
        provider.encrypt().unwrap();
        assert!(matches!(
            provider.encrypt(),
            Err(SecretError::WrongStatus { .. })
        ));
    }

    #[test]
    fn does_not_decrypt_other_backend_ciphertext() {
        let config = ResolvedConfig::default();
        let base = BaseSecret::new(Some(SecretStatus::Aes256Gcm), "abcd", "ab".repeat(32), "");
        let mut provider = LocalProvider::new(base, &config);
        assert!(!provider.is_encrypted());
        assert!(matches!(
            provider.decrypt(),
            Err(SecretError::WrongStatus {
                expected: SecretStatus::Secretbox,
                actual: Some(SecretStatus::Aes256Gcm),
            })
        ));
    }

    #[test]
    fn non_base64_payload_is_malformed() {
        let config = ResolvedConfig::default();
        let base = BaseSecret::new(Some(SecretStatus::Secretbox), "%%%", "ab".repeat(32), "");
        let mut provider = LocalProvider::new(base, &config);
        assert!(matches!(
            provider.decrypt(),
            Err(SecretError::MalformedCiphertext { .. })
        ));
    }

    #[test]
    fn master_key_sets_mode() {
        let config = ResolvedConfig::new("local://", Some(MasterKey::new("master")));
        let base = BaseSecret::new(Some(SecretStatus::Plain), "x", "", "ctx");
        let mut provider = LocalProvider::new(base, &config);
        provider.encrypt().unwrap();
        assert_eq!(provider.mode(), MODE_MASTER_KEY);
        provider.decrypt().unwrap();
        assert_eq!(provider.payload(), "x");
        assert_eq!(provider.mode(), 0);
    }

    #[test]
    fn unknown_mode_is_invalid() {
        let config = ResolvedConfig::default();
        let mut base = BaseSecret::new(Some(SecretStatus::Secretbox), "AAAA", "ab".repeat(32), "");
        base.mode = 7;
        let mut provider = LocalProvider::new(base, &config);
        assert!(matches!(
            provider.decrypt(),
            Err(SecretError::InvalidSecret { .. })
        ));
    }
}

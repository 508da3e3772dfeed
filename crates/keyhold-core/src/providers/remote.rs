//! Provider delegating to an external key management service.
//!
//! The service itself (AWS KMS, GCP KMS, Vault transit, Azure Key Vault) is
//! behind the [`KeyService`] trait; [`RemoteProvider`] adds the secret
//! lifecycle on top of it.
//!
//! With a master key configured, secrets are double-wrapped: the payload is
//! sealed locally with a fresh data key bound to the master key (stored in
//! `key`, mode 1), and the sealed bytes are then wrapped by the service.
//! Neither the service nor the stored record alone can recover the plaintext.

use std::fmt;
use std::sync::Arc;

use crate::config::{MasterKey, ResolvedConfig};
use crate::crypto::{self, EncryptionKey};
use crate::error::SecretError;
use crate::provider::{self, BaseSecret, SecretProvider};
use crate::status::SecretStatus;

use super::{MODE_DATA_KEY, MODE_MASTER_KEY};

/// A key service able to wrap and unwrap bytes under a key it holds.
///
/// Calls may block on network I/O. Retries, if any, belong to the
/// implementation.
pub trait KeyService: Send + Sync {
    /// Service name, for logs and errors.
    fn name(&self) -> &str;

    /// Encrypt `plaintext`, authenticating `aad`. Returns a text ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::KeyService`] or any other error describing
    /// the failure.
    fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, SecretError>;

    /// Decrypt a ciphertext produced by [`seal`](KeyService::seal).
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::MalformedCiphertext`] for an unparseable
    /// ciphertext, or [`SecretError::KeyService`] when the service refuses.
    fn open(&self, ciphertext: &str, aad: &[u8]) -> Result<Vec<u8>, SecretError>;
}

/// Secret provider backed by a [`KeyService`].
#[derive(Clone)]
pub struct RemoteProvider {
    base: BaseSecret,
    encrypted_status: SecretStatus,
    service: Arc<dyn KeyService>,
    master_key: Option<MasterKey>,
}

impl RemoteProvider {
    /// Wrap `base` for a service producing `encrypted_status` ciphertexts.
    #[must_use]
    pub fn new(
        base: BaseSecret,
        encrypted_status: SecretStatus,
        service: Arc<dyn KeyService>,
        config: &ResolvedConfig,
    ) -> Self {
        Self {
            base,
            encrypted_status,
            service,
            master_key: config.master_key().cloned(),
        }
    }

    fn seal_locally(&self, data_key: &EncryptionKey) -> Result<Vec<u8>, SecretError> {
        let cipher_key = super::cipher_key(
            data_key,
            MODE_MASTER_KEY,
            self.master_key.as_ref(),
            &self.base.additional_data,
        )?;
        Ok(crypto::seal_aes_gcm(
            &cipher_key,
            self.base.payload.as_bytes(),
            self.base.additional_data.as_bytes(),
        )?)
    }

    fn open_locally(&self, sealed: &[u8]) -> Result<Vec<u8>, SecretError> {
        let data_key = super::parse_data_key(&self.base.key)?;
        let cipher_key = super::cipher_key(
            &data_key,
            MODE_MASTER_KEY,
            self.master_key.as_ref(),
            &self.base.additional_data,
        )?;
        crypto::open_aes_gcm(&cipher_key, sealed, self.base.additional_data.as_bytes())
            .map_err(super::open_error)
    }
}

impl SecretProvider for RemoteProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn encrypt(&mut self) -> Result<(), SecretError> {
        provider::expect_status(&self.base, SecretStatus::Plain)?;
        if self.base.payload.is_empty() {
            return Err(SecretError::invalid("cannot encrypt an empty payload"));
        }
        let aad = self.base.additional_data.as_bytes();

        let (payload, key, mode) = if self.master_key.is_some() {
            let data_key = EncryptionKey::generate();
            let sealed = self.seal_locally(&data_key)?;
            let wrapped = self.service.seal(&sealed, aad)?;
            (wrapped, data_key.to_hex(), MODE_MASTER_KEY)
        } else {
            let wrapped = self.service.seal(self.base.payload.as_bytes(), aad)?;
            (wrapped, String::new(), MODE_DATA_KEY)
        };

        self.base.status = Some(self.encrypted_status);
        self.base.payload = payload;
        self.base.key = key;
        self.base.mode = mode;
        Ok(())
    }

    fn decrypt(&mut self) -> Result<(), SecretError> {
        provider::expect_status(&self.base, self.encrypted_status)?;
        if self.base.payload.is_empty() {
            return Err(SecretError::malformed("empty ciphertext"));
        }

        let unwrapped = self
            .service
            .open(&self.base.payload, self.base.additional_data.as_bytes())?;
        let plaintext = match self.base.mode {
            MODE_DATA_KEY => unwrapped,
            MODE_MASTER_KEY => self.open_locally(&unwrapped)?,
            other => {
                return Err(SecretError::invalid(format!(
                    "unsupported encryption mode {other}"
                )));
            }
        };
        provider::store_plaintext(&mut self.base, plaintext)
    }

    fn is_encrypted(&self) -> bool {
        self.base.status == Some(self.encrypted_status)
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

impl fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("service", &self.service.name())
            .field("encrypted_status", &self.encrypted_status)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

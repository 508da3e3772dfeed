//! The secret envelope.
//!
//! A [`Secret`] holds exactly one provider behind a reader/writer lock and
//! exposes every secret operation by delegating to it. Accessors take the
//! shared lock, mutators (including `encrypt`/`decrypt`, which may block on a
//! key service) take the exclusive lock. No method holds the locks of two
//! envelopes at once. Lock poisoning is ignored.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Serialize, Serializer};

use crate::crypto::HEX_KEY_LEN;
use crate::error::{SecretError, ValidationError};
use crate::kms::Kms;
use crate::provider::{BaseSecret, SecretProvider};
use crate::status::SecretStatus;

/// A confidential value whose encryption backend is chosen at runtime.
///
/// Build secrets through a [`Kms`]. Cloning produces an independent envelope
/// with its own lock and a deep copy of the provider.
pub struct Secret {
    provider: RwLock<Box<dyn SecretProvider>>,
}

impl Secret {
    /// Wrap a provider in a new envelope.
    #[must_use]
    pub fn from_provider(provider: Box<dyn SecretProvider>) -> Self {
        Self {
            provider: RwLock::new(provider),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Box<dyn SecretProvider>> {
        self.provider.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Box<dyn SecretProvider>> {
        self.provider.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the full wire record.
    #[must_use]
    pub fn to_base(&self) -> BaseSecret {
        self.read().base().clone()
    }

    /// The current status, `None` for the empty secret.
    #[must_use]
    pub fn status(&self) -> Option<SecretStatus> {
        self.read().status()
    }

    /// The ciphertext or plaintext, depending on the status.
    #[must_use]
    pub fn payload(&self) -> String {
        self.read().payload().to_owned()
    }

    /// The backend key material, possibly empty.
    #[must_use]
    pub fn key(&self) -> String {
        self.read().key().to_owned()
    }

    /// The context bound to the ciphertext, possibly empty.
    #[must_use]
    pub fn additional_data(&self) -> String {
        self.read().additional_data().to_owned()
    }

    /// The backend-specific encryption mode.
    #[must_use]
    pub fn mode(&self) -> i64 {
        self.read().mode()
    }

    /// Whether the held provider reports its own ciphertext.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.read().is_encrypted()
    }

    /// Whether the status is `Plain`.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.status() == Some(SecretStatus::Plain)
    }

    /// Whether the status is `Redacted`.
    #[must_use]
    pub fn is_redacted(&self) -> bool {
        self.status() == Some(SecretStatus::Redacted)
    }

    /// Whether status, payload, key and additional data are all empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().base().is_empty()
    }

    /// Neither plain nor empty: an already-stored secret that should be kept
    /// as is when a user resubmits it.
    #[must_use]
    pub fn is_not_plain_and_not_empty(&self) -> bool {
        let provider = self.read();
        let base = provider.base();
        base.status != Some(SecretStatus::Plain) && !base.is_empty()
    }

    /// Check that the secret is acceptable as user input.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Unrecognized`] if the status is missing,
    /// `Redacted` or `AzureKeyVault`, or the payload is empty.
    pub fn validate_input(&self) -> Result<(), ValidationError> {
        validate_input(self.read().base()).map(|_| ())
    }

    /// Check user-input rules plus the key length its backend requires.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Unrecognized`] as for
    /// [`validate_input`](Secret::validate_input), or
    /// [`ValidationError::KeyLength`] if the key has the wrong length.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let provider = self.read();
        let base = provider.base();
        let status = validate_input(base)?;

        let actual = base.key.len();
        let key_ok = match status {
            SecretStatus::Aes256Gcm | SecretStatus::Secretbox => actual == HEX_KEY_LEN,
            SecretStatus::Aws | SecretStatus::Gcp | SecretStatus::VaultTransit => {
                actual == 0 || actual == HEX_KEY_LEN
            }
            _ => true,
        };
        if key_ok {
            Ok(())
        } else {
            Err(ValidationError::KeyLength {
                status,
                expected: HEX_KEY_LEN,
                actual,
            })
        }
    }

    /// Boolean form of [`validate_input`](Secret::validate_input).
    #[must_use]
    pub fn is_valid_input(&self) -> bool {
        self.validate_input().is_ok()
    }

    /// Boolean form of [`validate`](Secret::validate).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Field-by-field equality of status, payload, key, additional data and
    /// mode. The providers may differ.
    #[must_use]
    pub fn is_equal(&self, other: &Secret) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        // One lock at a time.
        let mine = self.to_base();
        let theirs = other.to_base();
        mine == theirs
    }

    /// Replace the key material.
    pub fn set_key(&self, key: String) {
        self.write().set_key(key);
    }

    /// Replace the additional data.
    pub fn set_additional_data(&self, additional_data: String) {
        self.write().set_additional_data(additional_data);
    }

    /// Replace the status without touching the payload.
    pub fn set_status(&self, status: Option<SecretStatus>) {
        self.write().set_status(status);
    }

    /// Drop the key and additional data, keeping payload and status.
    ///
    /// The result shows that the secret exists and how it is protected, but
    /// cannot be decrypted out of band.
    pub fn hide(&self) {
        let mut provider = self.write();
        provider.set_key(String::new());
        provider.set_additional_data(String::new());
    }

    /// Encrypt the plaintext payload in place.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error unchanged; see
    /// [`SecretProvider::encrypt`].
    pub fn encrypt(&self) -> Result<(), SecretError> {
        self.write().encrypt()
    }

    /// Decrypt the payload in place.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error unchanged; see
    /// [`SecretProvider::decrypt`].
    pub fn decrypt(&self) -> Result<(), SecretError> {
        self.write().decrypt()
    }

    /// Decrypt if encrypted, otherwise do nothing.
    ///
    /// The check and the decryption happen under one exclusive lock, so this
    /// is safe to call on a secret of unknown state.
    ///
    /// # Errors
    ///
    /// Same as [`decrypt`](Secret::decrypt) when the secret is encrypted.
    pub fn try_decrypt(&self) -> Result<(), SecretError> {
        let mut provider = self.write();
        if provider.is_encrypted() {
            provider.decrypt()
        } else {
            Ok(())
        }
    }

    /// Replace this secret with one parsed from JSON.
    ///
    /// On error the secret is left unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`Kms::secret_from_json`].
    pub fn load_json(&self, kms: &Kms, data: &[u8]) -> Result<(), SecretError> {
        let provider = kms.provider_for_record(BaseSecret::from_json(data)?)?;
        *self.write() = provider;
        Ok(())
    }
}

fn validate_input(base: &BaseSecret) -> Result<SecretStatus, ValidationError> {
    let status = match base.status {
        Some(status) if status.is_valid_input() => status,
        Some(status) => {
            return Err(ValidationError::Unrecognized {
                reason: format!("status {status} is not accepted as input"),
            });
        }
        None => {
            return Err(ValidationError::Unrecognized {
                reason: "missing status".to_owned(),
            });
        }
    };
    if base.payload.is_empty() {
        return Err(ValidationError::Unrecognized {
            reason: "empty payload".to_owned(),
        });
    }
    Ok(status)
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::from_provider(self.read().clone_box())
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.read().base().serialize(serializer)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("provider", &self.read())
            .finish()
    }
}

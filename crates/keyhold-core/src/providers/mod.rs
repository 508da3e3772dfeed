//! Built-in provider implementations.
//!
//! - [`BuiltinProvider`]: AES-256-GCM, status `AES-256-GCM`.
//! - [`LocalProvider`]: XChaCha20-Poly1305, status `Secretbox`. The fallback
//!   when no registered scheme matches the configured URL.
//! - [`RemoteProvider`]: delegates to a [`KeyService`] for the cloud statuses.
//! - [`TransitKeyService`]: an in-process [`KeyService`] with one named key.
//!
//! The two in-process providers share one scheme: a random 32-byte data key
//! is generated per encryption, stored hex-encoded in `key`, and expanded via
//! HKDF (salted with the master key when `mode` is [`MODE_MASTER_KEY`]) into
//! the cipher key. Additional data is both the HKDF `info` and the AEAD AAD.

mod builtin;
mod local;
mod remote;
mod transit;

pub use builtin::BuiltinProvider;
pub use local::LocalProvider;
pub use remote::{KeyService, RemoteProvider};
pub use transit::TransitKeyService;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::config::MasterKey;
use crate::crypto::{self, EncryptionKey};
use crate::error::{CryptoError, SecretError};
use crate::provider::{self, BaseSecret};
use crate::status::SecretStatus;

/// The data key alone decrypts the secret.
pub const MODE_DATA_KEY: i64 = 0;

/// Decryption also requires the master key the secret was encrypted under.
pub const MODE_MASTER_KEY: i64 = 1;

/// AEAD used by an in-process provider, with its payload text encoding.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DataKeyCipher {
    /// AES-256-GCM, hex payload.
    Aes256Gcm,
    /// XChaCha20-Poly1305, base64 payload.
    XChaCha20Poly1305,
}

impl DataKeyCipher {
    fn status(self) -> SecretStatus {
        match self {
            Self::Aes256Gcm => SecretStatus::Aes256Gcm,
            Self::XChaCha20Poly1305 => SecretStatus::Secretbox,
        }
    }

    fn seal(self, key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> Result<String, CryptoError> {
        Ok(match self {
            Self::Aes256Gcm => hex::encode(crypto::seal_aes_gcm(key, plaintext, aad)?),
            Self::XChaCha20Poly1305 => BASE64.encode(crypto::seal_xchacha(key, plaintext, aad)?),
        })
    }

    fn open(self, key: &EncryptionKey, payload: &str, aad: &[u8]) -> Result<Vec<u8>, SecretError> {
        let combined = match self {
            Self::Aes256Gcm => hex::decode(payload)
                .map_err(|e| SecretError::malformed(format!("payload is not hex: {e}")))?,
            Self::XChaCha20Poly1305 => BASE64
                .decode(payload)
                .map_err(|e| SecretError::malformed(format!("payload is not base64: {e}")))?,
        };
        let opened = match self {
            Self::Aes256Gcm => crypto::open_aes_gcm(key, &combined, aad),
            Self::XChaCha20Poly1305 => crypto::open_xchacha(key, &combined, aad),
        };
        opened.map_err(open_error)
    }
}

/// Encrypt a `Plain` secret in place with a fresh data key.
pub(crate) fn seal_with_data_key(
    cipher: DataKeyCipher,
    base: &mut BaseSecret,
    master_key: Option<&MasterKey>,
) -> Result<(), SecretError> {
    provider::expect_status(base, SecretStatus::Plain)?;
    if base.payload.is_empty() {
        return Err(SecretError::invalid("cannot encrypt an empty payload"));
    }

    let data_key = EncryptionKey::generate();
    let mode = mode_for(master_key);
    let cipher_key = cipher_key(&data_key, mode, master_key, &base.additional_data)?;
    let payload = cipher.seal(
        &cipher_key,
        base.payload.as_bytes(),
        base.additional_data.as_bytes(),
    )?;

    base.status = Some(cipher.status());
    base.payload = payload;
    base.key = data_key.to_hex();
    base.mode = mode;
    Ok(())
}

/// Decrypt a secret produced by [`seal_with_data_key`] in place.
pub(crate) fn open_with_data_key(
    cipher: DataKeyCipher,
    base: &mut BaseSecret,
    master_key: Option<&MasterKey>,
) -> Result<(), SecretError> {
    provider::expect_status(base, cipher.status())?;

    let data_key = parse_data_key(&base.key)?;
    let cipher_key = cipher_key(&data_key, base.mode, master_key, &base.additional_data)?;
    let plaintext = cipher.open(&cipher_key, &base.payload, base.additional_data.as_bytes())?;
    provider::store_plaintext(base, plaintext)
}

/// The mode new encryptions use under the given master key.
pub(crate) fn mode_for(master_key: Option<&MasterKey>) -> i64 {
    if master_key.is_some() {
        MODE_MASTER_KEY
    } else {
        MODE_DATA_KEY
    }
}

/// Derive the cipher key for `mode` from a data key.
pub(crate) fn cipher_key(
    data_key: &EncryptionKey,
    mode: i64,
    master_key: Option<&MasterKey>,
    additional_data: &str,
) -> Result<EncryptionKey, SecretError> {
    let salt = match mode {
        MODE_DATA_KEY => None,
        MODE_MASTER_KEY => Some(master_key.ok_or(SecretError::MissingMasterKey)?.as_bytes()),
        other => {
            return Err(SecretError::invalid(format!("unsupported encryption mode {other}")));
        }
    };
    Ok(crypto::derive_key(data_key, salt, additional_data.as_bytes())?)
}

/// Parse the hex data key stored in a secret's `key` field.
pub(crate) fn parse_data_key(key: &str) -> Result<EncryptionKey, SecretError> {
    EncryptionKey::from_hex(key).ok_or_else(|| {
        SecretError::malformed(format!(
            "key must be {} hex characters, got {}",
            crypto::HEX_KEY_LEN,
            key.len()
        ))
    })
}

/// A ciphertext too short to hold its nonce is malformed, not a crypto failure.
pub(crate) fn open_error(err: CryptoError) -> SecretError {
    match err {
        CryptoError::CiphertextTooShort { expected, actual } => SecretError::malformed(format!(
            "ciphertext too short: expected at least {expected} bytes, got {actual}"
        )),
        other => SecretError::Crypto(other),
    }
}

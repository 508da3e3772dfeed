//! Cryptographic primitives for the in-process providers.
//!
//! Provides AES-256-GCM and XChaCha20-Poly1305 authenticated encryption,
//! HKDF-SHA256 key derivation, and a zeroize-on-drop key newtype. All key
//! material is automatically cleared from memory when dropped.
//!
//! # Security model
//!
//! - Every encryption generates a fresh random nonce via `OsRng`.
//! - Ciphertext format: `nonce || ciphertext || tag (16 bytes)`, with a
//!   12-byte nonce for AES-256-GCM and a 24-byte nonce for XChaCha20-Poly1305.
//! - Additional data is authenticated but not encrypted.
//! - Cipher keys are never used directly: each secret's random data key is
//!   expanded through HKDF with the secret's additional data as `info`.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Length of the AES-GCM and Poly1305 authentication tag.
const TAG_LEN: usize = 16;

/// Nonce length for AES-256-GCM (96 bits).
const GCM_NONCE_LEN: usize = 12;

/// Nonce length for XChaCha20-Poly1305 (192 bits).
const XCHACHA_NONCE_LEN: usize = 24;

/// Length of a hex-encoded [`EncryptionKey`].
pub const HEX_KEY_LEN: usize = 64;

/// A 256-bit key that is zeroized on drop.
///
/// Used for per-secret data keys and for keys derived from them. The inner
/// bytes are never exposed in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a new random key using the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Parse a key from its 64-character hex form.
    ///
    /// Returns `None` if the input is not hex or does not decode to 32 bytes.
    #[must_use]
    pub fn from_hex(encoded: &str) -> Option<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(encoded, &mut bytes).ok()?;
        Some(Self(bytes))
    }

    /// Hex-encode the key. The result is always [`HEX_KEY_LEN`] characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care: the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt with AES-256-GCM under a fresh random nonce.
///
/// Returns `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn seal_aes_gcm(
    key: &EncryptionKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    let mut combined = Vec::with_capacity(GCM_NONCE_LEN.saturating_add(ciphertext.len()));
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt output of [`seal_aes_gcm`].
///
/// # Errors
///
/// Returns [`CryptoError::CiphertextTooShort`] if the input cannot hold a
/// nonce and a tag, and [`CryptoError::Decryption`] if authentication fails
/// (wrong key, wrong additional data, corrupted data, or tampered tag).
pub fn open_aes_gcm(
    key: &EncryptionKey,
    combined: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let (nonce_bytes, ciphertext) = split_nonce(combined, GCM_NONCE_LEN)?;
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|e| CryptoError::Decryption {
            reason: e.to_string(),
        })
}

/// Encrypt with XChaCha20-Poly1305 under a fresh random nonce.
///
/// Returns `nonce (24 bytes) || ciphertext || tag (16 bytes)`.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
pub fn seal_xchacha(
    key: &EncryptionKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.as_bytes()));
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    let mut combined = Vec::with_capacity(XCHACHA_NONCE_LEN.saturating_add(ciphertext.len()));
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt output of [`seal_xchacha`].
///
/// # Errors
///
/// Same as [`open_aes_gcm`].
pub fn open_xchacha(
    key: &EncryptionKey,
    combined: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let (nonce_bytes, ciphertext) = split_nonce(combined, XCHACHA_NONCE_LEN)?;
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|e| CryptoError::Decryption {
            reason: e.to_string(),
        })
}

/// Derive a cipher key from a data key using HKDF-SHA256.
///
/// `salt` binds the result to a master key when one is in use; `info` is the
/// secret's additional data, so the same data key under different contexts
/// yields unrelated cipher keys.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if HKDF expansion fails (should
/// only happen if output length exceeds 255 * hash length).
pub fn derive_key(
    data_key: &EncryptionKey,
    salt: Option<&[u8]>,
    info: &[u8],
) -> Result<EncryptionKey, CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, data_key.as_bytes());
    let mut derived = [0u8; 32];
    hk.expand(info, &mut derived)
        .map_err(|e| CryptoError::KeyDerivation {
            context: String::from_utf8_lossy(info).into_owned(),
            reason: e.to_string(),
        })?;
    Ok(EncryptionKey::from_bytes(derived))
}

fn split_nonce(combined: &[u8], nonce_len: usize) -> Result<(&[u8], &[u8]), CryptoError> {
    let min = nonce_len.saturating_add(TAG_LEN);
    if combined.len() < min {
        return Err(CryptoError::CiphertextTooShort {
            expected: min,
            actual: combined.len(),
        });
    }
    Ok(combined.split_at(nonce_len))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn aes_gcm_roundtrip_with_aad() {
        let key = EncryptionKey::generate();
        let ciphertext = seal_aes_gcm(&key, b"secret data", b"user1").unwrap();
        let decrypted = open_aes_gcm(&key, &ciphertext, b"user1").unwrap();
        assert_eq!(decrypted, b"secret data");
    }

    #[test]
    fn aes_gcm_wrong_aad_fails() {
        let key = EncryptionKey::generate();
        let ciphertext = seal_aes_gcm(&key, b"secret", b"user1").unwrap();
        let result = open_aes_gcm(&key, &ciphertext, b"user2");
        assert!(matches!(result, Err(CryptoError::Decryption { .. })));
    }

    #[test]
    fn aes_gcm_too_short_fails() {
        let key = EncryptionKey::generate();
        let result = open_aes_gcm(&key, &[0u8; 10], b"");
        assert!(matches!(
            result,
            Err(CryptoError::CiphertextTooShort {
                expected: 28,
                actual: 10
            })
        ));
    }

    #[test]
    fn xchacha_roundtrip_and_nonce_len() {
        let key = EncryptionKey::generate();
        let ciphertext = seal_xchacha(&key, b"data", b"").unwrap();
        // nonce (24) + tag (16) + plaintext (4)
        assert_eq!(ciphertext.len(), 44);
        let decrypted = open_xchacha(&key, &ciphertext, b"").unwrap();
        assert_eq!(decrypted, b"data");
    }

    #[test]
    fn xchacha_tampered_ciphertext_fails() {
        let key = EncryptionKey::generate();
        let mut ciphertext = seal_xchacha(&key, b"secret", b"ctx").unwrap();
        if let Some(byte) = ciphertext.get_mut(XCHACHA_NONCE_LEN) {
            *byte ^= 0xFF;
        }
        let result = open_xchacha(&key, &ciphertext, b"ctx");
        assert!(matches!(result, Err(CryptoError::Decryption { .. })));
    }

    #[test]
    fn two_encryptions_produce_different_ciphertext() {
        let key = EncryptionKey::generate();
        let ct1 = seal_aes_gcm(&key, b"same data", b"").unwrap();
        let ct2 = seal_aes_gcm(&key, b"same data", b"").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn derive_key_depends_on_salt_and_info() {
        let data_key = EncryptionKey::generate();
        let plain = derive_key(&data_key, None, b"user1").unwrap();
        let again = derive_key(&data_key, None, b"user1").unwrap();
        let salted = derive_key(&data_key, Some(b"master".as_slice()), b"user1").unwrap();
        let other_info = derive_key(&data_key, None, b"user2").unwrap();
        assert_eq!(plain.as_bytes(), again.as_bytes());
        assert_ne!(plain.as_bytes(), salted.as_bytes());
        assert_ne!(plain.as_bytes(), other_info.as_bytes());
    }

    #[test]
    fn hex_form_is_64_chars_and_parses_back() {
        let key = EncryptionKey::generate();
        let encoded = key.to_hex();
        assert_eq!(encoded.len(), HEX_KEY_LEN);
        let parsed = EncryptionKey::from_hex(&encoded).unwrap();
        assert_eq!(parsed.as_bytes(), key.as_bytes());
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(EncryptionKey::from_hex("zz").is_none());
        assert!(EncryptionKey::from_hex("abcd").is_none());
    }

    #[test]
    fn encryption_key_debug_redacts_bytes() {
        let key = EncryptionKey::generate();
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"));
    }
}

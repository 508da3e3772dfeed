//! Error types for `keyhold-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. Errors never include key material or payloads, only statuses,
//! paths, or operation descriptions.

use std::path::PathBuf;

use crate::status::SecretStatus;

/// Errors from cryptographic primitives.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD encryption failed.
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },

    /// AEAD decryption failed (wrong key, corrupted ciphertext, or tampered tag).
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// HKDF key derivation failed.
    #[error("key derivation failed for context '{context}': {reason}")]
    KeyDerivation { context: String, reason: String },

    /// Ciphertext is too short to contain a valid nonce + tag.
    #[error("ciphertext too short: expected at least {expected} bytes, got {actual}")]
    CiphertextTooShort { expected: usize, actual: usize },
}

/// Errors from secret operations (encrypt, decrypt, deserialization).
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The operation is not allowed for the secret's current status.
    #[error("wrong secret status: expected {expected}, got {}", display_status(.actual))]
    WrongStatus {
        expected: SecretStatus,
        actual: Option<SecretStatus>,
    },

    /// The secret is structurally invalid.
    #[error("invalid secret: {reason}")]
    InvalidSecret { reason: String },

    /// Stored ciphertext or key material cannot be parsed.
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext { reason: String },

    /// The secret was bound to a master key, but none is configured.
    #[error("secret requires a master key but none is configured")]
    MissingMasterKey,

    /// A cryptographic primitive failed.
    #[error("secret crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A delegated key service rejected or failed the request.
    #[error("key service '{service}' failed: {reason}")]
    KeyService { service: String, reason: String },

    /// The serialized record could not be parsed.
    #[error("secret serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Shorthand for [`SecretError::InvalidSecret`].
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidSecret {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`SecretError::MalformedCiphertext`].
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCiphertext {
            reason: reason.into(),
        }
    }
}

/// Reasons a secret fails validation.
///
/// The two variants let callers tell an unusable secret apart from one whose
/// key simply has the wrong shape for its backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Status not accepted as input, or payload missing.
    #[error("unrecognized secret: {reason}")]
    Unrecognized { reason: String },

    /// The key length does not match what the status requires.
    ///
    /// `expected` and `actual` count bytes of the key string, which for the
    /// hex keys this crate produces equals the character count.
    #[error("invalid key length for {status} secret: expected {expected} characters, got {actual}")]
    KeyLength {
        status: SecretStatus,
        expected: usize,
        actual: usize,
    },
}

/// Errors from loading the KMS configuration. These are fatal to startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The master key file could not be read.
    #[error("failed to read master key from '{}': {source}", .path.display())]
    MasterKeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[allow(clippy::ref_option)]
fn display_status(status: &Option<SecretStatus>) -> &'static str {
    status.map_or("<empty>", SecretStatus::as_str)
}

//! In-process transit key service.
//!
//! Implements [`KeyService`] with a named AES-256-GCM key held in memory,
//! using Vault's transit ciphertext format. Useful as the `VaultTransit`
//! backend in development and tests, where no Vault server is available.
//!
//! Ciphertext is always `vault:v1:{base64}`; the service holds one key
//! version and refuses any other.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::crypto::{self, EncryptionKey};
use crate::error::SecretError;

use super::KeyService;

/// The only key version this service produces or accepts.
const KEY_VERSION: u32 = 1;

/// A named transit key kept in process memory.
pub struct TransitKeyService {
    name: String,
    key: EncryptionKey,
}

impl TransitKeyService {
    /// Create a service with a fresh random key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: EncryptionKey::generate(),
        }
    }

    fn refused(&self, reason: String) -> SecretError {
        SecretError::KeyService {
            service: self.name.clone(),
            reason,
        }
    }
}

impl KeyService for TransitKeyService {
    fn name(&self) -> &str {
        &self.name
    }

    fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<String, SecretError> {
        let ciphertext = crypto::seal_aes_gcm(&self.key, plaintext, aad)?;
        Ok(format!("vault:v{KEY_VERSION}:{}", BASE64.encode(&ciphertext)))
    }

    fn open(&self, ciphertext: &str, aad: &[u8]) -> Result<Vec<u8>, SecretError> {
        let (version, raw_ct) = parse_ciphertext(ciphertext)?;
        if version != KEY_VERSION {
            return Err(self.refused(format!("unknown key version {version}")));
        }
        crypto::open_aes_gcm(&self.key, &raw_ct, aad).map_err(super::open_error)
    }
}

impl std::fmt::Debug for TransitKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitKeyService")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Parse `vault:v{version}:{base64}` ciphertext format.
fn parse_ciphertext(ct: &str) -> Result<(u32, Vec<u8>), SecretError> {
    let mut parts = ct.splitn(3, ':');
    let (Some("vault"), Some(version_part), Some(encoded)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(SecretError::malformed(
            "invalid ciphertext format, expected vault:v{N}:{base64}",
        ));
    };

    let version_str = version_part
        .strip_prefix('v')
        .ok_or_else(|| SecretError::malformed("invalid version prefix, expected 'v{N}'"))?;

    let version: u32 = version_str
        .parse()
        .map_err(|_| SecretError::malformed(format!("invalid version number: {version_str}")))?;

    let raw = BASE64
        .decode(encoded)
        .map_err(|e| SecretError::malformed(format!("invalid base64 ciphertext: {e}")))?;

    Ok((version, raw))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let service = TransitKeyService::new("payments");
        let ct = service.seal(b"card", b"ctx").unwrap();
        assert!(ct.starts_with("vault:v1:"));
        assert_eq!(service.open(&ct, b"ctx").unwrap(), b"card");
    }

    #[test]
    fn other_key_version_is_refused() {
        let service = TransitKeyService::new("payments");
        let ct = service.seal(b"data", b"").unwrap();
        let bumped = ct.replacen("vault:v1:", "vault:v2:", 1);
        assert!(matches!(
            service.open(&bumped, b""),
            Err(SecretError::KeyService { .. })
        ));
    }

    #[test]
    fn other_service_cannot_unwrap() {
        let a = TransitKeyService::new("a");
        let b = TransitKeyService::new("b");
        let ct = a.seal(b"data", b"").unwrap();
        assert!(matches!(b.open(&ct, b""), Err(SecretError::Crypto(_))));
    }

    #[test]
    fn parse_rejects_bad_formats() {
        for bad in ["", "vault", "vault:1:AAAA", "vault:vx:AAAA", "kms:v1:AAAA", "vault:v1:!!"] {
            assert!(
                matches!(parse_ciphertext(bad), Err(SecretError::MalformedCiphertext { .. })),
                "{bad}"
            );
        }
    }
}

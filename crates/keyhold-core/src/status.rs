//! Secret statuses and backend URL schemes.
//!
//! A status tags the current form of a secret: plaintext, one encrypted form
//! per backend, or redacted. The wire representation is a fixed string so
//! that a serialized secret identifies the backend able to decrypt it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SecretError;

/// The form a secret is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecretStatus {
    /// Plain text, must be encrypted before storage.
    Plain,
    /// Encrypted in-process with AES-256-GCM.
    Aes256Gcm,
    /// Encrypted in-process with a secretbox-style AEAD.
    Secretbox,
    /// Wrapped by Google Cloud KMS.
    Gcp,
    /// Wrapped by AWS KMS.
    Aws,
    /// Wrapped by the Vault transit engine.
    VaultTransit,
    /// Wrapped by Azure Key Vault.
    AzureKeyVault,
    /// Payload intentionally destroyed. Not reversible.
    Redacted,
}

impl SecretStatus {
    /// Every recognized status, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Plain,
        Self::Aes256Gcm,
        Self::Secretbox,
        Self::Gcp,
        Self::Aws,
        Self::VaultTransit,
        Self::AzureKeyVault,
        Self::Redacted,
    ];

    /// The wire tag for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "Plain",
            Self::Aes256Gcm => "AES-256-GCM",
            Self::Secretbox => "Secretbox",
            Self::Gcp => "GCP",
            Self::Aws => "AWS",
            Self::VaultTransit => "VaultTransit",
            Self::AzureKeyVault => "AzureKeyVault",
            Self::Redacted => "Redacted",
        }
    }

    /// Whether a user may submit a secret in this status.
    ///
    /// Everything except [`SecretStatus::Redacted`] and
    /// [`SecretStatus::AzureKeyVault`], which is produced by a registered
    /// backend but never accepted from input.
    #[must_use]
    pub const fn is_valid_input(self) -> bool {
        !matches!(self, Self::Redacted | Self::AzureKeyVault)
    }

    /// Statuses produced by in-process encryption. Their key is mandatory.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Aes256Gcm | Self::Secretbox)
    }

    /// Statuses produced by a delegated key service.
    #[must_use]
    pub const fn is_delegated(self) -> bool {
        matches!(
            self,
            Self::Gcp | Self::Aws | Self::VaultTransit | Self::AzureKeyVault
        )
    }

    /// Parse an optional status from its wire tag, where `""` means no status.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidSecret`] for an unknown tag.
    pub fn parse_optional(tag: &str) -> Result<Option<Self>, SecretError> {
        if tag.is_empty() {
            Ok(None)
        } else {
            tag.parse().map(Some)
        }
    }
}

impl fmt::Display for SecretStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretStatus {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SecretError::invalid(format!("unknown secret status '{s}'")))
    }
}

impl Serialize for SecretStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SecretStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

/// Supported backend URL schemes.
///
/// A configured URL selects its backend by prefix, e.g. `hashivault://transit`
/// selects whatever is registered under [`scheme::VAULT_TRANSIT`].
pub mod scheme {
    /// In-process secretbox encryption. The default.
    pub const LOCAL: &str = "local";
    /// In-process AES-256-GCM encryption.
    pub const BUILTIN: &str = "builtin";
    /// AWS KMS.
    pub const AWS: &str = "awskms";
    /// Google Cloud KMS.
    pub const GCP: &str = "gcpkms";
    /// `HashiCorp` Vault transit engine.
    pub const VAULT_TRANSIT: &str = "hashivault";
    /// Azure Key Vault.
    pub const AZURE_KEY_VAULT: &str = "azurekeyvault";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_tags_parse_back() {
        for status in SecretStatus::ALL {
            assert_eq!(status.as_str().parse::<SecretStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_tag_is_invalid_secret() {
        let result = "ROT13".parse::<SecretStatus>();
        assert!(matches!(result, Err(SecretError::InvalidSecret { .. })));
    }

    #[test]
    fn empty_tag_is_no_status() {
        assert_eq!(SecretStatus::parse_optional("").unwrap(), None);
        assert_eq!(
            SecretStatus::parse_optional("AWS").unwrap(),
            Some(SecretStatus::Aws)
        );
    }

    #[test]
    fn redacted_is_not_valid_input() {
        assert!(!SecretStatus::Redacted.is_valid_input());
        assert!(SecretStatus::Plain.is_valid_input());
        assert!(SecretStatus::Aws.is_valid_input());
    }

    #[test]
    fn azure_key_vault_is_not_valid_input() {
        assert!(!SecretStatus::AzureKeyVault.is_valid_input());
        assert!(SecretStatus::AzureKeyVault.is_delegated());
    }

    #[test]
    fn local_and_delegated_are_disjoint() {
        for status in SecretStatus::ALL {
            assert!(!(status.is_local() && status.is_delegated()), "{status}");
        }
    }

    #[test]
    fn serializes_as_wire_tag() {
        let json = serde_json::to_string(&SecretStatus::Aes256Gcm).unwrap();
        assert_eq!(json, "\"AES-256-GCM\"");
    }
}

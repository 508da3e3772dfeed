//! The capability contract every encryption backend implements.
//!
//! A provider owns the full state of one secret as a [`BaseSecret`] and knows
//! how to move it between its plaintext and encrypted forms. The envelope in
//! [`crate::secret`] never looks inside a provider beyond this trait.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SecretError;
use crate::status::SecretStatus;

/// The wire record of a secret.
///
/// This is the only form a secret takes outside the process; everything else
/// is derived from it. Empty strings and a zero mode are omitted when
/// serialized, and missing fields read back as empty.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireSecret", into = "WireSecret")]
pub struct BaseSecret {
    /// Current form of the payload. `None` only for the empty secret.
    pub status: Option<SecretStatus>,
    /// Ciphertext or plaintext, depending on `status`.
    pub payload: String,
    /// Backend key material, usually a 64-char hex data key. May be empty.
    pub key: String,
    /// Authenticated context bound to the ciphertext. May be empty.
    pub additional_data: String,
    /// Backend-specific encryption mode.
    pub mode: i64,
}

impl BaseSecret {
    /// Build a record with the given fields and mode 0.
    #[must_use]
    pub fn new(
        status: Option<SecretStatus>,
        payload: impl Into<String>,
        key: impl Into<String>,
        additional_data: impl Into<String>,
    ) -> Self {
        Self {
            status,
            payload: payload.into(),
            key: key.into(),
            additional_data: additional_data.into(),
            mode: 0,
        }
    }

    /// Whether status, payload, key and additional data are all empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payload.is_empty()
            && self.key.is_empty()
            && self.additional_data.is_empty()
    }

    /// Parse a record from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Json`] for malformed JSON and
    /// [`SecretError::InvalidSecret`] for an unknown status tag.
    pub fn from_json(data: &[u8]) -> Result<Self, SecretError> {
        let wire: WireSecret = serde_json::from_slice(data)?;
        Self::try_from(wire)
    }
}

impl fmt::Debug for BaseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseSecret")
            .field("status", &self.status)
            .field("payload", &"[REDACTED]")
            .field("key", &"[REDACTED]")
            .field("additional_data", &self.additional_data)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Serde shape of [`BaseSecret`], with the status still a raw string.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct WireSecret {
    #[serde(skip_serializing_if = "String::is_empty")]
    status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    payload: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    additional_data: String,
    #[serde(skip_serializing_if = "is_zero")]
    mode: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(mode: &i64) -> bool {
    *mode == 0
}

impl TryFrom<WireSecret> for BaseSecret {
    type Error = SecretError;

    fn try_from(wire: WireSecret) -> Result<Self, Self::Error> {
        Ok(Self {
            status: SecretStatus::parse_optional(&wire.status)?,
            payload: wire.payload,
            key: wire.key,
            additional_data: wire.additional_data,
            mode: wire.mode,
        })
    }
}

impl From<BaseSecret> for WireSecret {
    fn from(base: BaseSecret) -> Self {
        Self {
            status: base.status.map(SecretStatus::as_str).unwrap_or_default().to_owned(),
            payload: base.payload,
            key: base.key,
            additional_data: base.additional_data,
            mode: base.mode,
        }
    }
}

/// An encryption backend holding the state of a single secret.
///
/// Implementations store their state in a [`BaseSecret`] and expose it via
/// [`base`](SecretProvider::base) / [`base_mut`](SecretProvider::base_mut);
/// the field accessors and mutators are provided on top of those.
///
/// Implementations must be `Send + Sync` so that envelopes can be shared
/// across threads.
pub trait SecretProvider: Send + Sync {
    /// Short backend name, for logs.
    fn name(&self) -> &'static str;

    /// Encrypt the plaintext payload in place.
    ///
    /// # Errors
    ///
    /// - [`SecretError::WrongStatus`] unless the status is `Plain`.
    /// - [`SecretError::InvalidSecret`] if the payload is empty.
    /// - Any backend error, unchanged.
    fn encrypt(&mut self) -> Result<(), SecretError>;

    /// Decrypt the payload in place, leaving a `Plain` secret.
    ///
    /// # Errors
    ///
    /// - [`SecretError::WrongStatus`] unless the status is this backend's
    ///   encrypted status.
    /// - [`SecretError::MalformedCiphertext`] if the payload or key cannot be
    ///   parsed.
    /// - Any backend error, unchanged.
    fn decrypt(&mut self) -> Result<(), SecretError>;

    /// Whether the current state is this backend's ciphertext.
    fn is_encrypted(&self) -> bool;

    /// Produce an independent deep copy.
    fn clone_box(&self) -> Box<dyn SecretProvider>;

    /// The full secret state.
    fn base(&self) -> &BaseSecret;

    /// Mutable access to the full secret state.
    fn base_mut(&mut self) -> &mut BaseSecret;

    /// Current status, `None` for the empty secret.
    fn status(&self) -> Option<SecretStatus> {
        self.base().status
    }

    /// Ciphertext or plaintext, depending on the status.
    fn payload(&self) -> &str {
        &self.base().payload
    }

    /// Backend key material, possibly empty.
    fn key(&self) -> &str {
        &self.base().key
    }

    /// Context bound to the ciphertext, possibly empty.
    fn additional_data(&self) -> &str {
        &self.base().additional_data
    }

    /// Backend-specific encryption mode.
    fn mode(&self) -> i64 {
        self.base().mode
    }

    /// Replace the key material.
    fn set_key(&mut self, key: String) {
        self.base_mut().key = key;
    }

    /// Replace the additional data.
    fn set_additional_data(&mut self, additional_data: String) {
        self.base_mut().additional_data = additional_data;
    }

    /// Replace the status without touching the payload.
    fn set_status(&mut self, status: Option<SecretStatus>) {
        self.base_mut().status = status;
    }
}

impl Clone for Box<dyn SecretProvider> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl fmt::Debug for dyn SecretProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretProvider")
            .field("name", &self.name())
            .field("state", self.base())
            .finish()
    }
}

/// Fail with [`SecretError::WrongStatus`] unless `base` has `expected` status.
pub(crate) fn expect_status(base: &BaseSecret, expected: SecretStatus) -> Result<(), SecretError> {
    if base.status == Some(expected) {
        Ok(())
    } else {
        Err(SecretError::WrongStatus {
            expected,
            actual: base.status,
        })
    }
}

/// Replace the state with the decrypted plaintext.
///
/// Additional data is kept; key material and mode no longer apply.
pub(crate) fn store_plaintext(base: &mut BaseSecret, plaintext: Vec<u8>) -> Result<(), SecretError> {
    let payload = String::from_utf8(plaintext)
        .map_err(|_| SecretError::malformed("decrypted payload is not valid UTF-8"))?;
    base.status = Some(SecretStatus::Plain);
    base.payload = payload;
    base.key.clear();
    base.mode = 0;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_serializes_to_empty_object() {
        let json = serde_json::to_string(&BaseSecret::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn wire_field_names_are_fixed() {
        let mut base = BaseSecret::new(Some(SecretStatus::Secretbox), "ct", "k", "user1");
        base.mode = 1;
        let value = serde_json::to_value(&base).unwrap();
        assert_eq!(value["status"], "Secretbox");
        assert_eq!(value["payload"], "ct");
        assert_eq!(value["key"], "k");
        assert_eq!(value["additional_data"], "user1");
        assert_eq!(value["mode"], 1);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let base = BaseSecret::from_json(br#"{"status":"Plain","payload":"x"}"#).unwrap();
        assert_eq!(base.status, Some(SecretStatus::Plain));
        assert_eq!(base.payload, "x");
        assert!(base.key.is_empty());
        assert_eq!(base.mode, 0);
    }

    #[test]
    fn large_mode_is_kept() {
        let base = BaseSecret::from_json(br#"{"status":"Secretbox","payload":"ct","mode":5000000000}"#)
            .unwrap();
        assert_eq!(base.mode, 5_000_000_000);
        let value = serde_json::to_value(&base).unwrap();
        assert_eq!(value["mode"], 5_000_000_000_i64);
    }

    #[test]
    fn unknown_status_is_invalid_secret() {
        let result = BaseSecret::from_json(br#"{"status":"Caesar","payload":"x"}"#);
        assert!(matches!(result, Err(SecretError::InvalidSecret { .. })));
    }

    #[test]
    fn malformed_json_is_json_error() {
        let result = BaseSecret::from_json(b"{not json");
        assert!(matches!(result, Err(SecretError::Json(_))));
    }

    #[test]
    fn is_empty_ignores_mode() {
        let mut base = BaseSecret::default();
        base.mode = 3;
        assert!(base.is_empty());
        base.additional_data = "user".to_owned();
        assert!(!base.is_empty());
    }

    #[test]
    fn debug_does_not_leak_payload_or_key() {
        let base = BaseSecret::new(Some(SecretStatus::Plain), "hunter2", "deadbeef", "");
        let debug = format!("{base:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("deadbeef"));
    }
}

//! Provider dispatch: builds [`Secret`] envelopes from configuration or from
//! serialized records.
//!
//! A [`Kms`] owns the resolved configuration and the provider registry. It is
//! built once at startup and shared by reference (or `Arc`) with every
//! component that creates or loads secrets.

use serde::de::{DeserializeSeed, Deserializer};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{KmsConfig, ResolvedConfig};
use crate::error::{ConfigError, SecretError};
use crate::provider::{BaseSecret, SecretProvider};
use crate::providers::LocalProvider;
use crate::registry::ProviderRegistry;
use crate::secret::Secret;
use crate::status::SecretStatus;

/// Resolved configuration plus provider registry.
#[derive(Debug, Clone)]
pub struct Kms {
    config: ResolvedConfig,
    registry: ProviderRegistry,
}

impl Kms {
    /// Combine a resolved configuration with a fully populated registry.
    #[must_use]
    pub fn new(config: ResolvedConfig, registry: ProviderRegistry) -> Self {
        for entry in registry.iter() {
            debug!(
                scheme = entry.scheme(),
                encrypted_status = %entry.encrypted_status(),
                "secret provider registered"
            );
        }
        Self { config, registry }
    }

    /// Resolve `config` and combine it with `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the master key cannot be loaded.
    pub fn initialize(config: &KmsConfig, registry: ProviderRegistry) -> Result<Self, ConfigError> {
        Ok(Self::new(config.initialize()?, registry))
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The provider registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build a secret with the given fields, using the configured backend.
    #[must_use]
    pub fn new_secret(
        &self,
        status: Option<SecretStatus>,
        payload: impl Into<String>,
        key: impl Into<String>,
        additional_data: impl Into<String>,
    ) -> Secret {
        let base = BaseSecret::new(status, payload, key, additional_data);
        Secret::from_provider(self.provider_for_url(base))
    }

    /// A secret with no status and no fields.
    #[must_use]
    pub fn empty_secret(&self) -> Secret {
        self.new_secret(None, "", "", "")
    }

    /// A `Plain` secret holding `payload`.
    #[must_use]
    pub fn plain_secret(&self, payload: impl Into<String>) -> Secret {
        self.new_secret(Some(SecretStatus::Plain), payload, "", "")
    }

    /// Build a secret from a wire record.
    ///
    /// Empty records and `Plain`/`Redacted` records use the configured
    /// backend; encrypted records use the backend that produced their status.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidSecret`] if no registered backend
    /// produces the record's status.
    pub fn secret_from_base(&self, base: BaseSecret) -> Result<Secret, SecretError> {
        self.provider_for_record(base).map(Secret::from_provider)
    }

    /// Parse a secret from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Json`] for malformed JSON and
    /// [`SecretError::InvalidSecret`] for an unknown or unregistered status.
    pub fn secret_from_json(&self, data: &[u8]) -> Result<Secret, SecretError> {
        self.secret_from_base(BaseSecret::from_json(data)?)
    }

    /// A [`DeserializeSeed`] producing secrets through this `Kms`.
    #[must_use]
    pub fn seed(&self) -> SecretSeed<'_> {
        SecretSeed { kms: self }
    }

    pub(crate) fn provider_for_record(
        &self,
        base: BaseSecret,
    ) -> Result<Box<dyn SecretProvider>, SecretError> {
        if base.is_empty() {
            return Ok(self.provider_for_url(base));
        }
        let Some(status) = base.status else {
            debug!("secret record has fields but no status");
            return Err(SecretError::invalid("secret has no status"));
        };
        if matches!(status, SecretStatus::Plain | SecretStatus::Redacted) {
            return Ok(self.provider_for_url(base));
        }

        match self.registry.for_status(status) {
            Some(entry) => Ok(entry.build(base, &self.config)),
            None => {
                debug!(%status, "no provider registered for status");
                Err(SecretError::invalid(format!(
                    "no provider registered for status {status}"
                )))
            }
        }
    }

    fn provider_for_url(&self, base: BaseSecret) -> Box<dyn SecretProvider> {
        let url = self.config.url();
        if let Some(entry) = self.registry.for_url(url) {
            return entry.build(base, &self.config);
        }
        warn!(url, "no secret provider registered for URL, falling back to local provider");
        LocalProvider::boxed(base, &self.config)
    }
}

/// Deserializes a [`Secret`] with a given [`Kms`], for records embedded in
/// larger documents.
#[derive(Debug, Clone, Copy)]
pub struct SecretSeed<'a> {
    kms: &'a Kms,
}

impl<'de> DeserializeSeed<'de> for SecretSeed<'_> {
    type Value = Secret;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Secret, D::Error> {
        let base = BaseSecret::deserialize(deserializer)?;
        self.kms
            .secret_from_base(base)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::MasterKey;
    use crate::providers::TransitKeyService;
    use crate::status::scheme;

    fn kms(url: &str) -> Kms {
        Kms::new(ResolvedConfig::new(url, None), ProviderRegistry::with_defaults())
    }

    fn kms_with_transit(url: &str, master_key: Option<MasterKey>) -> Kms {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register_key_service(
            scheme::VAULT_TRANSIT,
            SecretStatus::VaultTransit,
            Arc::new(TransitKeyService::new("transit")),
        );
        Kms::new(ResolvedConfig::new(url, master_key), registry)
    }

    #[test]
    fn new_secret_uses_configured_scheme() {
        let secret = kms("builtin://").plain_secret("hello");
        secret.encrypt().unwrap();
        assert_eq!(secret.status(), Some(SecretStatus::Aes256Gcm));

        let secret = kms("local://").plain_secret("hello");
        secret.encrypt().unwrap();
        assert_eq!(secret.status(), Some(SecretStatus::Secretbox));
    }

    #[test]
    fn unknown_url_falls_back_to_local() {
        let secret = kms("awskms://alias/app").plain_secret("hello");
        secret.encrypt().unwrap();
        assert_eq!(secret.status(), Some(SecretStatus::Secretbox));
    }

    #[test]
    fn encrypted_record_uses_backend_of_its_status() {
        // Configured for local, but the record was produced by builtin.
        let builtin = kms("builtin://");
        let local = kms("local://");
        let secret = builtin.plain_secret("hello");
        secret.encrypt().unwrap();
        let json = serde_json::to_vec(&secret).unwrap();

        let loaded = local.secret_from_json(&json).unwrap();
        assert!(loaded.is_encrypted());
        loaded.decrypt().unwrap();
        assert_eq!(loaded.payload(), "hello");
    }

    #[test]
    fn plain_and_redacted_records_use_configured_scheme() {
        let kms = kms("builtin://");
        let loaded = kms
            .secret_from_json(br#"{"status":"Plain","payload":"hello"}"#)
            .unwrap();
        loaded.encrypt().unwrap();
        assert_eq!(loaded.status(), Some(SecretStatus::Aes256Gcm));

        let redacted = kms
            .secret_from_json(br#"{"status":"Redacted","payload":"***"}"#)
            .unwrap();
        assert!(redacted.is_redacted());
        assert!(!redacted.is_encrypted());
    }

    #[test]
    fn empty_record_builds_empty_secret() {
        let secret = kms("local://").secret_from_json(b"{}").unwrap();
        assert!(secret.is_empty());
    }

    #[test]
    fn unregistered_status_is_invalid_secret() {
        let result = kms("local://")
            .secret_from_json(br#"{"status":"AWS","payload":"ct"}"#);
        assert!(matches!(result, Err(SecretError::InvalidSecret { .. })));
    }

    #[test]
    fn fields_without_status_are_invalid_secret() {
        let result = kms("local://").secret_from_json(br#"{"payload":"ct"}"#);
        assert!(matches!(result, Err(SecretError::InvalidSecret { .. })));
    }

    #[test]
    fn transit_record_roundtrips_through_registry() {
        let kms = kms_with_transit("hashivault://transit", None);
        let secret = kms.plain_secret("db-password");
        secret.set_additional_data("app1".to_owned());
        secret.encrypt().unwrap();
        assert_eq!(secret.status(), Some(SecretStatus::VaultTransit));

        let json = serde_json::to_vec(&secret).unwrap();
        let loaded = kms.secret_from_json(&json).unwrap();
        assert!(loaded.is_equal(&secret));
        loaded.decrypt().unwrap();
        assert_eq!(loaded.payload(), "db-password");
    }

    #[test]
    fn transit_record_with_master_key_needs_it_to_decrypt() {
        let kms = kms_with_transit("hashivault://transit", Some(MasterKey::new("m")));
        let secret = kms.plain_secret("db-password");
        secret.encrypt().unwrap();
        assert_eq!(secret.mode(), 1);
        assert_eq!(secret.key().len(), 64);

        let json = serde_json::to_vec(&secret).unwrap();
        let loaded = kms.secret_from_json(&json).unwrap();
        loaded.decrypt().unwrap();
        assert_eq!(loaded.payload(), "db-password");
    }

    #[test]
    fn seed_deserializes_embedded_secret() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
            password: serde_json::Value,
        }

        let kms = kms("local://");
        let user: User = serde_json::from_str(
            r#"{"name":"alice","password":{"status":"Plain","payload":"pw"}}"#,
        )
        .unwrap();
        let secret = kms.seed().deserialize(user.password).unwrap();
        assert_eq!(user.name, "alice");
        assert_eq!(secret.payload(), "pw");
        assert!(secret.is_plain());
    }

    #[test]
    fn initialize_resolves_config() {
        let config = KmsConfig::default();
        let kms = Kms::initialize(&config, ProviderRegistry::with_defaults()).unwrap();
        assert_eq!(kms.config().url(), "local://");
        assert_eq!(kms.registry().len(), 2);
    }
}

//! Provider registry: URL scheme → (encrypted status, factory).
//!
//! The registry is populated once at startup and then moved into a
//! [`Kms`](crate::kms::Kms), after which it is only reachable through shared
//! references. Lookups are deterministic:
//!
//! - By URL: the longest registered scheme that prefixes the URL wins.
//! - By status: the earliest registration producing that status wins.

use std::fmt;
use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::provider::{BaseSecret, SecretProvider};
use crate::providers::{BuiltinProvider, KeyService, LocalProvider, RemoteProvider};
use crate::status::{SecretStatus, scheme};

/// Builds a provider holding `base`, configured from the resolved config.
pub type ProviderFactory =
    Arc<dyn Fn(BaseSecret, &ResolvedConfig) -> Box<dyn SecretProvider> + Send + Sync>;

/// One registered backend.
#[derive(Clone)]
pub struct Registration {
    scheme: String,
    encrypted_status: SecretStatus,
    factory: ProviderFactory,
}

impl Registration {
    /// The URL scheme this backend is selected by.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The status of secrets this backend has encrypted.
    #[must_use]
    pub fn encrypted_status(&self) -> SecretStatus {
        self.encrypted_status
    }

    /// Build a provider for `base`.
    #[must_use]
    pub fn build(&self, base: BaseSecret, config: &ResolvedConfig) -> Box<dyn SecretProvider> {
        (self.factory)(base, config)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("scheme", &self.scheme)
            .field("encrypted_status", &self.encrypted_status)
            .finish_non_exhaustive()
    }
}

/// Table of registered backends, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    entries: Vec<Registration>,
}

impl ProviderRegistry {
    /// An empty registry. Every URL falls back to [`LocalProvider`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the in-process backends: `builtin` (AES-256-GCM) and
    /// `local` (Secretbox).
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(scheme::BUILTIN, SecretStatus::Aes256Gcm, BuiltinProvider::boxed);
        registry.register(scheme::LOCAL, SecretStatus::Secretbox, LocalProvider::boxed);
        registry
    }

    /// Register a backend, replacing any earlier registration of `scheme`.
    ///
    /// A replaced entry keeps its position in the status lookup order.
    pub fn register<F>(&mut self, scheme: &str, encrypted_status: SecretStatus, factory: F)
    where
        F: Fn(BaseSecret, &ResolvedConfig) -> Box<dyn SecretProvider> + Send + Sync + 'static,
    {
        let registration = Registration {
            scheme: scheme.to_owned(),
            encrypted_status,
            factory: Arc::new(factory),
        };
        match self.entries.iter_mut().find(|entry| entry.scheme == scheme) {
            Some(entry) => *entry = registration,
            None => self.entries.push(registration),
        }
    }

    /// Register a [`RemoteProvider`] backed by `service`.
    pub fn register_key_service(
        &mut self,
        scheme: &str,
        encrypted_status: SecretStatus,
        service: Arc<dyn KeyService>,
    ) {
        self.register(scheme, encrypted_status, move |base, config| {
            Box::new(RemoteProvider::new(
                base,
                encrypted_status,
                Arc::clone(&service),
                config,
            ))
        });
    }

    /// The backend selected by `url`: the longest registered scheme that is a
    /// prefix of it.
    #[must_use]
    pub fn for_url(&self, url: &str) -> Option<&Registration> {
        self.entries
            .iter()
            .filter(|entry| url.starts_with(entry.scheme.as_str()))
            .max_by_key(|entry| entry.scheme.len())
    }

    /// The first registered backend whose encrypted status is `status`.
    #[must_use]
    pub fn for_status(&self, status: SecretStatus) -> Option<&Registration> {
        self.entries
            .iter()
            .find(|entry| entry.encrypted_status == status)
    }

    /// All registrations, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter()
    }

    /// Number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no backend is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::providers::TransitKeyService;

    #[test]
    fn defaults_register_local_backends() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.for_url("local://").unwrap().encrypted_status(),
            SecretStatus::Secretbox
        );
        assert_eq!(
            registry.for_url("builtin://").unwrap().encrypted_status(),
            SecretStatus::Aes256Gcm
        );
    }

    #[test]
    fn longest_prefix_wins_regardless_of_order() {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register("local+aws", SecretStatus::Aws, BuiltinProvider::boxed);
        assert_eq!(registry.for_url("local+aws://key").unwrap().scheme(), "local+aws");
        assert_eq!(registry.for_url("local://").unwrap().scheme(), "local");

        let mut reversed = ProviderRegistry::new();
        reversed.register("local+aws", SecretStatus::Aws, BuiltinProvider::boxed);
        reversed.register(scheme::LOCAL, SecretStatus::Secretbox, LocalProvider::boxed);
        assert_eq!(reversed.for_url("local+aws://key").unwrap().scheme(), "local+aws");
    }

    #[test]
    fn unmatched_url_has_no_registration() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.for_url("awskms://alias/foo").is_none());
    }

    #[test]
    fn status_lookup_prefers_first_registration() {
        let mut registry = ProviderRegistry::new();
        registry.register("first", SecretStatus::Aes256Gcm, BuiltinProvider::boxed);
        registry.register("second", SecretStatus::Aes256Gcm, BuiltinProvider::boxed);
        assert_eq!(
            registry.for_status(SecretStatus::Aes256Gcm).unwrap().scheme(),
            "first"
        );
        assert!(registry.for_status(SecretStatus::Gcp).is_none());
    }

    #[test]
    fn reregistering_a_scheme_replaces_it_in_place() {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register(scheme::BUILTIN, SecretStatus::Gcp, BuiltinProvider::boxed);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.for_url("builtin://").unwrap().encrypted_status(),
            SecretStatus::Gcp
        );
        assert_eq!(registry.iter().next().unwrap().scheme(), scheme::BUILTIN);
    }

    #[test]
    fn key_service_registration_builds_remote_provider() {
        let mut registry = ProviderRegistry::with_defaults();
        registry.register_key_service(
            scheme::VAULT_TRANSIT,
            SecretStatus::VaultTransit,
            Arc::new(TransitKeyService::new("transit")),
        );
        let config = ResolvedConfig::new("hashivault://transit", None);
        let base = BaseSecret::new(Some(SecretStatus::Plain), "x", "", "");
        let mut provider = registry
            .for_url(config.url())
            .unwrap()
            .build(base, &config);
        assert_eq!(provider.name(), "remote");
        provider.encrypt().unwrap();
        assert_eq!(provider.status(), Some(SecretStatus::VaultTransit));
    }
}

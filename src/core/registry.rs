//! Lookup from user-facing keys to provider instances.

use crate::core::error::FetchError;
use crate::core::provider::RateProvider;
use crate::core::rate::ProviderDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Pseudo-key that expands to every registered provider.
pub const ALL_PROVIDERS: &str = "all";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Provider key '{0}' is already registered")]
    Duplicate(String),

    #[error("Provider key '{0}' must have the form 'country.bank'")]
    InvalidKey(String),
}

struct Registration {
    descriptor: ProviderDescriptor,
    provider: Arc<dyn RateProvider>,
}

/// Registered providers in registration order.
///
/// Built once at start-up, then shared behind an `Arc` and only read.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<Registration>,
    by_key: HashMap<String, usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ProviderDescriptor,
        provider: Arc<dyn RateProvider>,
    ) -> Result<(), RegistryError> {
        let key = descriptor.key.to_lowercase();
        let valid = key
            .split_once('.')
            .is_some_and(|(country, bank)| !country.is_empty() && !bank.is_empty() && !bank.contains('.'));
        if !valid {
            return Err(RegistryError::InvalidKey(descriptor.key));
        }
        if self.by_key.contains_key(&key) {
            return Err(RegistryError::Duplicate(key));
        }

        debug!(provider = %key, "Registering provider");
        self.by_key.insert(key, self.entries.len());
        self.entries.push(Registration {
            descriptor,
            provider,
        });
        Ok(())
    }

    /// Registers a provider under the descriptor it reports for itself.
    pub fn register_provider(&mut self, provider: Arc<dyn RateProvider>) -> Result<(), RegistryError> {
        self.register(provider.identify(), provider)
    }

    /// Maps a key or bare bank name to the canonical `country.bank` key.
    ///
    /// A bare bank name picks the first registered provider with that bank
    /// suffix.
    pub fn resolve_key(&self, key_or_alias: &str) -> Result<&str, FetchError> {
        self.position(key_or_alias)
            .map(|index| self.entries[index].descriptor.key.as_str())
            .ok_or_else(|| FetchError::UnknownProvider(key_or_alias.to_string()))
    }

    pub fn resolve(&self, key_or_alias: &str) -> Result<Arc<dyn RateProvider>, FetchError> {
        self.position(key_or_alias)
            .map(|index| Arc::clone(&self.entries[index].provider))
            .ok_or_else(|| FetchError::UnknownProvider(key_or_alias.to_string()))
    }

    pub fn descriptor(&self, key_or_alias: &str) -> Option<&ProviderDescriptor> {
        self.position(key_or_alias)
            .map(|index| &self.entries[index].descriptor)
    }

    pub fn list(&self) -> Vec<ProviderDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.descriptor.key.clone()).collect()
    }

    fn position(&self, key_or_alias: &str) -> Option<usize> {
        let wanted = key_or_alias.trim().to_lowercase();
        if wanted.contains('.') {
            return self.by_key.get(&wanted).copied();
        }
        self.entries
            .iter()
            .position(|e| e.descriptor.bank() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{ParsedRow, RawPayload};
    use async_trait::async_trait;

    struct StubProvider {
        descriptor: ProviderDescriptor,
    }

    impl StubProvider {
        fn new(key: &str) -> Arc<Self> {
            Arc::new(Self {
                descriptor: ProviderDescriptor::new(key, key, "KR", "KRW"),
            })
        }
    }

    #[async_trait]
    impl RateProvider for StubProvider {
        fn identify(&self) -> ProviderDescriptor {
            self.descriptor.clone()
        }

        async fn fetch_raw(&self) -> Result<RawPayload, FetchError> {
            Err(FetchError::unavailable(&self.descriptor.key, "stub"))
        }

        fn parse(&self, _payload: &RawPayload) -> Result<Vec<ParsedRow>, FetchError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_alias_and_full_key_resolve_to_same_instance() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(StubProvider::new("korea.hana")).unwrap();
        registry.register_provider(StubProvider::new("korea.woori")).unwrap();

        let by_alias = registry.resolve("hana").unwrap();
        let by_key = registry.resolve("korea.hana").unwrap();

        assert!(Arc::ptr_eq(&by_alias, &by_key));
        assert_eq!(registry.resolve_key("HANA").unwrap(), "korea.hana");
        assert_eq!(registry.resolve_key("Korea.Woori").unwrap(), "korea.woori");
    }

    #[test]
    fn test_alias_tie_goes_to_first_registered() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(StubProvider::new("korea.citi")).unwrap();
        registry.register_provider(StubProvider::new("usa.citi")).unwrap();

        assert_eq!(registry.resolve_key("citi").unwrap(), "korea.citi");
        assert_eq!(registry.resolve_key("usa.citi").unwrap(), "usa.citi");
    }

    #[test]
    fn test_unknown_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(StubProvider::new("korea.hana")).unwrap();

        let err = registry.resolve("kb").err().unwrap();
        assert_eq!(err, FetchError::UnknownProvider("kb".to_string()));
        assert!(registry.resolve_key("japan.hana").is_err());
    }

    #[test]
    fn test_register_rejects_bad_and_duplicate_keys() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(StubProvider::new("korea.hana")).unwrap();

        assert_eq!(
            registry.register_provider(StubProvider::new("korea.hana")),
            Err(RegistryError::Duplicate("korea.hana".to_string()))
        );
        assert_eq!(
            registry.register_provider(StubProvider::new("hana")),
            Err(RegistryError::InvalidKey("hana".to_string()))
        );
        assert_eq!(
            registry.register_provider(StubProvider::new("a.b.c")),
            Err(RegistryError::InvalidKey("a.b.c".to_string()))
        );
        assert_eq!(registry.keys(), vec!["korea.hana"]);
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(StubProvider::new("korea.woori")).unwrap();
        registry.register_provider(StubProvider::new("korea.hana")).unwrap();

        let keys: Vec<String> = registry.list().into_iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["korea.woori", "korea.hana"]);
    }
}

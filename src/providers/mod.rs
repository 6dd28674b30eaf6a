pub mod hana_provider;
pub mod html;
pub mod http;
pub mod woori_provider;

use crate::core::config::AppConfig;
use crate::core::provider::RateProvider;
use crate::core::registry::{ProviderRegistry, RegistryError};
use hana_provider::{HANA_KEY, HANA_URL, HanaProvider};
use http::PageClient;
use std::sync::Arc;
use tracing::debug;
use woori_provider::{WOORI_KEY, WOORI_URL, WooriProvider};

/// Registers the built-in bank providers in a fixed order.
///
/// Providers disabled in the config are left out; `base_url` overrides
/// replace the default page location.
pub fn builtin_registry(
    config: &AppConfig,
    client: &PageClient,
) -> Result<ProviderRegistry, RegistryError> {
    let base_url = |key: &str, default: &str| {
        config
            .provider(key)
            .and_then(|p| p.base_url.clone())
            .unwrap_or_else(|| default.to_string())
    };

    let candidates: Vec<(&str, Arc<dyn RateProvider>)> = vec![
        (
            HANA_KEY,
            Arc::new(HanaProvider::new(&base_url(HANA_KEY, HANA_URL), client.clone())),
        ),
        (
            WOORI_KEY,
            Arc::new(WooriProvider::new(&base_url(WOORI_KEY, WOORI_URL), client.clone())),
        ),
    ];

    let mut registry = ProviderRegistry::new();
    for (key, provider) in candidates {
        if config.provider(key).is_some_and(|p| !p.enabled) {
            debug!(provider = key, "Provider disabled in config");
            continue;
        }
        registry.register_provider(provider)?;
    }
    Ok(registry)
}

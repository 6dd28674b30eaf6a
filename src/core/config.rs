use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Fjall,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_minutes: u64,
    pub backend: CacheBackend,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            ttl_minutes: 30,
            backend: CacheBackend::default(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    pub retries: usize,
    pub backoff_base_ms: u64,
    /// Consecutive failures after which a provider is skipped for a while.
    pub breaker_threshold: Option<u32>,
    pub breaker_cooldown_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: 15,
            max_concurrency: 4,
            retries: 2,
            backoff_base_ms: 500,
            breaker_threshold: None,
            breaker_cooldown_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

fn lowercase_keys<'de, D>(deserializer: D) -> Result<HashMap<String, ProviderConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, ProviderConfig>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, provider)| (key.trim().to_lowercase(), provider))
        .collect())
}

fn default_provider() -> String {
    "korea.hana".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Keyed by lowercase provider key.
    #[serde(default, deserialize_with = "lowercase_keys")]
    pub providers: HashMap<String, ProviderConfig>,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_provider: default_provider(),
            force_refresh: false,
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            providers: HashMap::new(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config at the default location, falling back to defaults
    /// when no file exists yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "getcurcur", "getcurcur")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "getcurcur", "getcurcur")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn provider(&self, key: &str) -> Option<&ProviderConfig> {
        self.providers.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");

        assert_eq!(config.default_provider, "korea.hana");
        assert!(!config.force_refresh);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(30 * 60));
        assert_eq!(config.cache.backend, CacheBackend::Fjall);
        assert_eq!(config.fetch.timeout_secs, 15);
        assert_eq!(config.fetch.retries, 2);
        assert_eq!(config.fetch.backoff_base_ms, 500);
        assert!(config.fetch.breaker_threshold.is_none());
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
default_provider: korea.woori
force_refresh: true
cache:
  ttl_minutes: 10
  backend: json
fetch:
  timeout_secs: 5
  max_concurrency: 2
providers:
  korea.hana:
    base_url: "http://example.com/hana"
    timeout_secs: 30
  korea.woori:
    enabled: false
data_path: /tmp/getcurcur
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.default_provider, "korea.woori");
        assert!(config.force_refresh);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_minutes, 10);
        assert_eq!(config.cache.backend, CacheBackend::Json);
        assert_eq!(config.fetch.max_concurrency, 2);
        assert_eq!(config.fetch.retries, 2);

        let hana = config.provider("korea.hana").unwrap();
        assert_eq!(hana.base_url.as_deref(), Some("http://example.com/hana"));
        assert!(hana.enabled);
        assert!(!config.provider("korea.woori").unwrap().enabled);

        assert_eq!(hana.timeout_secs, Some(30));
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/getcurcur")
        );
    }

    #[test]
    fn test_provider_keys_are_lowercased() {
        let yaml_str = r#"
providers:
  Korea.Hana:
    enabled: false
  " KOREA.WOORI ":
    base_url: "http://example.com/woori"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert!(!config.provider("korea.hana").unwrap().enabled);
        assert_eq!(
            config.provider("korea.woori").unwrap().base_url.as_deref(),
            Some("http://example.com/woori")
        );
        assert!(config.provider("Korea.Hana").is_none());
    }
}

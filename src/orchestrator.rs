//! Cache-aware, concurrent rate fetching across providers.

use crate::cache::{CacheEntry, RateCache};
use crate::core::breaker::CircuitBreaker;
use crate::core::config::AppConfig;
use crate::core::error::{CacheError, FetchError};
use crate::core::normalize::normalize;
use crate::core::provider::{RateProvider, RawPayload};
use crate::core::rate::{ProviderDescriptor, RateRecord};
use crate::core::registry::{ALL_PROVIDERS, ProviderRegistry};
use crate::core::retry::{RetryPolicy, with_retry};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How a provider's records were obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    /// Fetched during this request.
    Fresh,
    /// Served from a cache entry within its TTL.
    Cached,
    /// The fetch failed; these are the last known records.
    Degraded { reason: String },
}

#[derive(Debug, Clone)]
pub struct ProviderRates {
    pub descriptor: ProviderDescriptor,
    pub records: Vec<RateRecord>,
    pub stored_at: DateTime<Utc>,
    pub status: ProviderStatus,
}

impl ProviderRates {
    fn from_entry(descriptor: ProviderDescriptor, entry: CacheEntry, status: ProviderStatus) -> Self {
        Self {
            descriptor,
            records: entry.records,
            stored_at: entry.stored_at,
            status,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ProviderStatus::Degraded { .. })
    }
}

/// Outcome of a multi-provider request. Both maps may be non-empty.
#[derive(Debug, Clone, Default)]
pub struct RateReport {
    pub results: BTreeMap<String, ProviderRates>,
    pub errors: BTreeMap<String, FetchError>,
}

impl RateReport {
    /// True when no provider produced any records.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_degraded(&self) -> bool {
        self.results.values().any(ProviderRates::is_degraded)
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Tunables for [`RateOrchestrator`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub ttl: Duration,
    pub max_concurrency: usize,
    pub timeout: Duration,
    /// Per-provider overrides of `timeout`.
    pub timeouts: HashMap<String, Duration>,
    pub retry: RetryPolicy,
    /// Failure threshold and cooldown of the circuit breaker, if enabled.
    pub breaker: Option<(u32, Duration)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            max_concurrency: 4,
            timeout: Duration::from_secs(15),
            timeouts: HashMap::new(),
            retry: RetryPolicy::default(),
            breaker: None,
        }
    }
}

impl FetchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeouts = config
            .providers
            .iter()
            .filter_map(|(key, p)| {
                p.timeout_secs
                    .map(|secs| (key.clone(), Duration::from_secs(secs)))
            })
            .collect();

        Self {
            ttl: config.cache.ttl(),
            max_concurrency: config.fetch.max_concurrency,
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            timeouts,
            retry: RetryPolicy::from_config(&config.fetch),
            breaker: config.fetch.breaker_threshold.map(|threshold| {
                (threshold, Duration::from_secs(config.fetch.breaker_cooldown_secs))
            }),
        }
    }

    pub fn timeout_for(&self, key: &str) -> Duration {
        self.timeouts.get(key).copied().unwrap_or(self.timeout)
    }
}

pub struct RateOrchestrator {
    registry: Arc<ProviderRegistry>,
    cache: RateCache,
    options: FetchOptions,
    breaker: Option<CircuitBreaker>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RateOrchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, cache: RateCache, options: FetchOptions) -> Self {
        let breaker = options
            .breaker
            .map(|(threshold, cooldown)| CircuitBreaker::new(threshold, cooldown));
        Self {
            registry,
            cache,
            options,
            breaker,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn list_providers(&self) -> Vec<ProviderDescriptor> {
        self.registry.list()
    }

    /// Returns rates for every requested key or alias.
    ///
    /// Unknown keys are reported without any fetch. Keys that resolve to the
    /// same provider are fetched once. A provider's failure never affects the
    /// others; when it has stale cached data that data is returned as
    /// degraded instead of an error.
    pub async fn get_rates<S: AsRef<str>>(&self, keys: &[S], force_refresh: bool) -> RateReport {
        let requested_at = Utc::now();
        let mut report = RateReport::default();

        let (resolved, unknown) = self.resolve_keys(keys);
        report.errors.extend(unknown);

        let mut to_fetch = Vec::new();
        for key in resolved {
            if !force_refresh && let Some(entry) = self.cached(&key).await {
                debug!(provider = %key, "Serving rates from cache");
                let descriptor = self.descriptor_of(&key);
                report.results.insert(
                    key,
                    ProviderRates::from_entry(descriptor, entry, ProviderStatus::Cached),
                );
                continue;
            }
            match self.registry.resolve(&key) {
                Ok(provider) => to_fetch.push((key, provider)),
                Err(e) => {
                    report.errors.insert(key, e);
                }
            }
        }

        if to_fetch.is_empty() {
            return report;
        }

        let limit = self.options.max_concurrency.max(1).min(to_fetch.len());
        debug!(providers = to_fetch.len(), limit, "Fetching providers");

        let outcomes: Vec<(String, Result<ProviderRates, FetchError>)> = stream::iter(to_fetch)
            .map(|(key, provider)| async move {
                let outcome = self
                    .refresh(&key, provider, force_refresh, requested_at)
                    .await;
                (key, outcome)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (key, outcome) in outcomes {
            match outcome {
                Ok(rates) => {
                    report.results.insert(key, rates);
                }
                Err(e) => {
                    report.errors.insert(key, e);
                }
            }
        }
        report
    }

    /// Drops the cached entry of one provider, or every entry.
    pub async fn clear_cache(&self, key: Option<&str>) -> Result<(), OrchestratorError> {
        match key {
            None => self.cache.clear_all().await?,
            Some(key) if key.eq_ignore_ascii_case(ALL_PROVIDERS) => self.cache.clear_all().await?,
            Some(key) => {
                let key = self.registry.resolve_key(key)?;
                self.cache.invalidate(key).await?;
            }
        }
        Ok(())
    }

    /// Canonical keys in request order without duplicates, plus the keys that
    /// did not resolve.
    fn resolve_keys<S: AsRef<str>>(&self, keys: &[S]) -> (Vec<String>, Vec<(String, FetchError)>) {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        let mut unknown = Vec::new();

        for key in keys {
            let key = key.as_ref().trim();
            let canonical = if key.eq_ignore_ascii_case(ALL_PROVIDERS) {
                self.registry.keys()
            } else {
                match self.registry.resolve_key(key) {
                    Ok(canonical) => vec![canonical.to_string()],
                    Err(e) => {
                        warn!(key, "Unknown provider requested");
                        unknown.push((key.to_string(), e));
                        continue;
                    }
                }
            };
            for key in canonical {
                if seen.insert(key.clone()) {
                    resolved.push(key);
                }
            }
        }
        (resolved, unknown)
    }

    fn descriptor_of(&self, key: &str) -> ProviderDescriptor {
        self.registry
            .descriptor(key)
            .cloned()
            .unwrap_or_else(|| ProviderDescriptor::new(key, key, "", ""))
    }

    /// Fresh cache entry for `key`. Cache failures count as a miss.
    async fn cached(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(provider = key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn stale(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get_stale(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(provider = key, error = %e, "Cache read failed while degrading");
                None
            }
        }
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(inflight.entry(key.to_string()).or_default())
    }

    /// Fetches one provider, falling back to its stale entry on failure.
    async fn refresh(
        &self,
        key: &str,
        provider: Arc<dyn RateProvider>,
        force_refresh: bool,
        requested_at: DateTime<Utc>,
    ) -> Result<ProviderRates, FetchError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        // A concurrent request may have refreshed this key while we waited.
        if let Some(entry) = self.cached(key).await
            && (!force_refresh || entry.stored_at >= requested_at)
        {
            debug!(provider = key, "Rates refreshed by a concurrent request");
            return Ok(ProviderRates::from_entry(
                self.descriptor_of(key),
                entry,
                ProviderStatus::Cached,
            ));
        }

        let fetched = match &self.breaker {
            Some(breaker) if !breaker.is_allowed(key) => Err(FetchError::unavailable(
                key,
                "circuit open after repeated failures",
            )),
            _ => self.fetch_fresh(key, provider.as_ref()).await.inspect_err(|_| {
                if let Some(breaker) = &self.breaker {
                    breaker.record_failure(key);
                }
            }),
        };

        match fetched {
            Ok(rates) => {
                if let Some(breaker) = &self.breaker {
                    breaker.record_success(key);
                }
                Ok(rates)
            }
            Err(err) => match self.stale(key).await {
                Some(entry) => {
                    warn!(
                        provider = key,
                        error = %err,
                        stored_at = %entry.stored_at,
                        "Fetch failed, serving stale rates"
                    );
                    Ok(ProviderRates::from_entry(
                        self.descriptor_of(key),
                        entry,
                        ProviderStatus::Degraded {
                            reason: err.to_string(),
                        },
                    ))
                }
                None => {
                    warn!(provider = key, error = %err, "Fetch failed");
                    Err(err)
                }
            },
        }
    }

    async fn fetch_fresh(
        &self,
        key: &str,
        provider: &dyn RateProvider,
    ) -> Result<ProviderRates, FetchError> {
        let payload = self.fetch_with_retry(key, provider).await?;
        let fetched_at = Utc::now();

        let rows = provider.parse(&payload)?;
        let descriptor = self.descriptor_of(key);
        let normalized = normalize(&descriptor, rows, fetched_at)?;
        info!(
            provider = key,
            records = normalized.records.len(),
            rejected = normalized.rejected.len(),
            "Fetched rates"
        );

        let stored_at = match self
            .cache
            .put(key, normalized.records.clone(), self.options.ttl)
            .await
        {
            Ok(entry) => entry.stored_at,
            Err(e) => {
                warn!(provider = key, error = %e, "Cache write failed");
                fetched_at
            }
        };

        Ok(ProviderRates {
            descriptor,
            records: normalized.records,
            stored_at,
            status: ProviderStatus::Fresh,
        })
    }

    async fn fetch_with_retry(
        &self,
        key: &str,
        provider: &dyn RateProvider,
    ) -> Result<RawPayload, FetchError> {
        let timeout = self.options.timeout_for(key);
        with_retry(
            || async move {
                match tokio::time::timeout(timeout, provider.fetch_raw()).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::unavailable(
                        key,
                        format!("timed out after {timeout:?}"),
                    )),
                }
            },
            &self.options.retry,
            FetchError::is_retryable,
        )
        .await
    }
}

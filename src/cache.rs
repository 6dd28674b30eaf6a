//! TTL-aware store of provider rate sets.
//!
//! Entries are kept as one JSON object per provider key on top of any
//! [`KeyValueCollection`]. Freshness is decided when an entry is read; expired
//! entries stay in the backing store so a failed refresh can still fall back
//! to them.

use crate::core::cache::KeyValueCollection;
use crate::core::error::CacheError;
use crate::core::normalize::validate_record;
use crate::core::rate::RateRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub records: Vec<RateRecord>,
    pub stored_at: DateTime<Utc>,
    #[serde(rename = "ttl_ms", with = "ttl_ms")]
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.stored_at) < ttl,
            Err(_) => true,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}

mod ttl_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Clone)]
pub struct RateCache {
    collection: Arc<dyn KeyValueCollection>,
}

impl RateCache {
    pub fn new(collection: Arc<dyn KeyValueCollection>) -> Self {
        Self { collection }
    }

    /// Returns the entry for `key` only if it is still fresh.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entry = self.read(key).await?;
        Ok(entry.filter(|entry| {
            let fresh = entry.is_fresh();
            if !fresh {
                debug!(key, stored_at = %entry.stored_at, "Cache entry expired");
            }
            fresh
        }))
    }

    /// Returns the entry for `key` whether or not it has expired.
    pub async fn get_stale(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.read(key).await
    }

    /// Replaces the whole record set stored for `key`.
    ///
    /// The entry ages from the moment its oldest record was fetched, so a fresh
    /// entry never carries data older than its TTL.
    pub async fn put(
        &self,
        key: &str,
        records: Vec<RateRecord>,
        ttl: Duration,
    ) -> Result<CacheEntry, CacheError> {
        let stored_at = records
            .iter()
            .map(|r| r.fetched_at)
            .min()
            .unwrap_or_else(Utc::now);
        let entry = CacheEntry {
            key: key.to_string(),
            records,
            stored_at,
            ttl,
        };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        self.collection.put(key, &bytes).await?;
        debug!(key, records = entry.records.len(), "Cache PUT");
        Ok(entry)
    }

    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        debug!(key, "Cache invalidate");
        self.collection.remove(key).await
    }

    pub async fn clear_all(&self) -> Result<(), CacheError> {
        debug!("Cache clear");
        self.collection.clear().await
    }

    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        self.collection.keys().await
    }

    async fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(bytes) = self.collection.get(key).await? else {
            return Ok(None);
        };

        match decode(key, &bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(reason) => {
                warn!(key, %reason, "Discarding unreadable cache entry");
                if let Err(e) = self.collection.remove(key).await {
                    warn!(key, error = %e, "Failed to remove unreadable cache entry");
                }
                Ok(None)
            }
        }
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<CacheEntry, String> {
    let entry: CacheEntry = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if entry.key != key {
        return Err(format!("entry belongs to '{}'", entry.key));
    }
    for record in &entry.records {
        validate_record(record)?;
    }
    Ok(entry)
}

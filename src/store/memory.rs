use crate::core::cache::KeyValueCollection;
use crate::core::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory collection backed by a HashMap behind an async mutex
#[derive(Clone, Default)]
pub struct MemoryCollection {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryCollection {
    /// Creates a new empty MemoryCollection
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCollection for MemoryCollection {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let map = self.inner.lock().await;
        let value = map.get(key).cloned();
        if value.is_some() {
            debug!("Memory HIT for key: {}", key);
        } else {
            debug!("Memory MISS for key: {}", key);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut map = self.inner.lock().await;
        debug!("Memory PUT for key: {}", key);
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut map = self.inner.lock().await;
        map.remove(key);
        debug!("Memory REMOVE for key: {}", key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut map = self.inner.lock().await;
        map.clear();
        debug!("Memory CLEAR");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let map = self.inner.lock().await;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

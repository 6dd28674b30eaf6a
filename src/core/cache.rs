use crate::core::error::CacheError;
use async_trait::async_trait;

/// Byte-oriented key/value storage used underneath the rate cache.
///
/// `put` replaces the whole value for a key in one step; readers never see a
/// partially written value.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn keys(&self) -> Result<Vec<String>, CacheError>;
}

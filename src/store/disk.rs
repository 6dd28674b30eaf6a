use crate::core::cache::KeyValueCollection;
use crate::core::error::CacheError;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Persistent collection stored in a fjall partition.
///
/// Each key maps to exactly one value, replaced by a single insert, so a
/// reader sees either the previous or the new value.
pub struct DiskCollection {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
}

impl DiskCollection {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }

    /// Opens (or creates) the keyspace at `path` and the named partition in it.
    pub fn open(path: &Path, name: &str) -> Result<Self, CacheError> {
        std::fs::create_dir_all(path)?;
        let keyspace = Arc::new(fjall::Config::new(path).open()?);
        let partition = keyspace.open_partition(name, PartitionCreateOptions::default())?;
        Ok(Self::new(keyspace, partition))
    }

    fn persist(&self) -> Result<(), CacheError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueCollection for DiskCollection {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self.partition.get(key)? {
            Some(value) => {
                debug!("Disk HIT for key: {}", key);
                Ok(Some(value.to_vec()))
            }
            None => {
                debug!("Disk MISS for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.partition.insert(key, value)?;
        self.persist()?;
        debug!("Disk PUT for key: {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.partition.remove(key)?;
        self.persist()?;
        debug!("Disk REMOVE for key: {}", key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        for key in self.keys().await? {
            self.partition.remove(key.as_str())?;
        }
        self.persist()?;
        debug!("Disk CLEAR");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for key in self.partition.keys() {
            let key = key?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}

pub mod disk;
pub mod json_dir;
pub mod memory;

use crate::core::cache::KeyValueCollection;
use crate::core::config::{CacheBackend, CacheConfig};
use crate::core::error::CacheError;
use disk::DiskCollection;
use json_dir::JsonDirCollection;
use memory::MemoryCollection;
use std::path::Path;
use std::sync::Arc;

/// Name of the partition / directory holding cached rate entries.
pub const RATES_COLLECTION: &str = "rates";

/// Opens the backing collection for the rate cache.
///
/// A disabled cache still gets an in-process collection so that one run never
/// fetches the same provider twice.
pub fn open_collection(
    config: &CacheConfig,
    data_path: &Path,
) -> Result<Arc<dyn KeyValueCollection>, CacheError> {
    if !config.enabled {
        return Ok(Arc::new(MemoryCollection::new()));
    }

    let cache_dir = data_path.join("cache");
    let collection: Arc<dyn KeyValueCollection> = match config.backend {
        CacheBackend::Fjall => Arc::new(DiskCollection::open(&cache_dir, RATES_COLLECTION)?),
        CacheBackend::Json => Arc::new(JsonDirCollection::open(&cache_dir.join(RATES_COLLECTION))?),
    };
    Ok(collection)
}

pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::storage::Storage;
use anyhow::Result;
pub use disk::DiskStorage;
pub use memory::MemoryStorage;
use std::sync::Arc;
use tracing::debug;

/// Opens the persistent store under the configured data directory.
pub fn open_storage(config: &AppConfig) -> Result<Arc<dyn Storage>> {
    let path = config.default_data_path()?.join("store");
    debug!("Opening store at {}", path.display());
    Ok(Arc::new(DiskStorage::open(&path)?))
}

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage_engine::{DiskStore, DocumentStore, MemoryStore};
use tracing::info;

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::error::{Result, UploadError};

pub const DEFAULT_CACHE_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub chunk_size: u64,
    /// Root of the disk store. Unset keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Chunk payloads kept in the LRU cache, 0 disables it.
    pub cache_size: usize,
    pub compression: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            data_dir: None,
            cache_size: DEFAULT_CACHE_SIZE,
            compression: false,
        }
    }
}

impl UploadConfig {
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(UploadError::Validation("chunk size must be positive".into()));
        }
        Ok(())
    }

    pub async fn open_store(&self) -> Result<Arc<dyn DocumentStore>> {
        match &self.data_dir {
            Some(dir) => {
                let mut store = DiskStore::new(dir)
                    .await?
                    .with_compression(self.compression);
                if self.cache_size > 0 {
                    store = store.with_cache(self.cache_size);
                }
                info!("Using disk store at {}", dir.display());
                Ok(Arc::new(store))
            }
            None => {
                info!("Using in-memory store");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

/// Per-user data directory, or `./storage` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("chunked-upload"))
        .unwrap_or_else(|| PathBuf::from("./storage"))
}

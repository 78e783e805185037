//! Store options and default locations
//!
//! Options can be loaded from a JSON file:
//! ```json
//! { "compression_level": 9, "sync_writes": false }
//! ```
//! Missing fields fall back to their defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tunables for a [`BlobStore`](crate::BlobStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// zstd level used when compressing new blobs
    pub compression_level: i32,
    /// fsync blobs before rename and the index after every write
    pub sync_writes: bool,
    /// Chunk size of the hash + compress pass
    pub buffer_size: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            compression_level: zstd::DEFAULT_COMPRESSION_LEVEL,
            sync_writes: true,
            buffer_size: 64 * 1024,
        }
    }
}

impl StoreOptions {
    /// Load options from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let options: StoreOptions = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values the codec or the copy loop cannot work with
    pub fn validate(&self) -> Result<()> {
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.compression_level) {
            return Err(Error::Configuration(format!(
                "compression_level {} outside {}..={}",
                self.compression_level,
                levels.start(),
                levels.end()
            )));
        }
        if self.buffer_size == 0 {
            return Err(Error::Configuration("buffer_size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Default working directory (`<data dir>/blobstore`)
pub fn default_store_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Configuration("Could not find data directory".into()))?;
    Ok(data_dir.join("blobstore"))
}

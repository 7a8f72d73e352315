//! Cache configuration.
//!
//! Built from the `[cache]` table of the loaded settings; the cache itself
//! never reads configuration sources.

use std::path::PathBuf;

use crate::config::CacheSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Serve and store rendered tables through the cache.
    pub enabled: bool,
    /// Flat directory holding one file per cached table.
    pub directory: PathBuf,
    /// Maximum number of entries kept after each store.
    pub limit: usize,
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            directory: settings.directory.clone(),
            limit: settings.limit,
        }
    }
}

use std::{path::Path, path::PathBuf, sync::Arc};

use metrics::counter;
use tracing::{debug, warn};

use super::{
    config::CacheConfig,
    digest::digest_file,
    error::{CacheError, CacheResult},
    eviction::{EvictionReport, enforce_limit},
    fs::{CacheFs, DiskFs},
    key::CacheKey,
    store::CacheStore,
};

pub(crate) const METRIC_CACHE_HIT_TOTAL: &str = "resultview_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS_TOTAL: &str = "resultview_cache_miss_total";
pub(crate) const METRIC_CACHE_STORE_TOTAL: &str = "resultview_cache_store_total";

/// Result of looking a source file up in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Hit(String),
    Miss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub key: CacheKey,
    pub eviction: EvictionReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub directory: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
    pub limit: usize,
}

/// Content-addressed cache of rendered output, keyed by source file bytes.
///
/// Every operation hashes the source anew, so renaming or moving a file keeps
/// its entry while rewriting it in place yields a new one. Storing triggers an
/// eviction pass, which may delete unrelated older entries.
#[derive(Debug, Clone)]
pub struct ResultCache {
    store: CacheStore,
    limit: usize,
}

impl ResultCache {
    /// Open a cache on the local filesystem.
    pub fn open(config: &CacheConfig) -> CacheResult<Self> {
        Self::with_fs(Arc::new(DiskFs), config)
    }

    pub fn with_fs(fs: Arc<dyn CacheFs>, config: &CacheConfig) -> CacheResult<Self> {
        let store = CacheStore::open(fs, config.directory.clone())?;
        Ok(Self {
            store,
            limit: config.limit,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn store_handle(&self) -> &CacheStore {
        &self.store
    }

    pub fn key_for(&self, source: &Path) -> CacheResult<CacheKey> {
        let digest = digest_file(source)?;
        Ok(CacheKey::from_digest(&digest))
    }

    pub fn is_cached(&self, source: &Path) -> CacheResult<bool> {
        let key = self.key_for(source)?;
        Ok(self.store.exists(&key))
    }

    /// Look up rendered output for `source`.
    ///
    /// Absence is a [`Lookup::Miss`], not an error. An entry that exists but
    /// cannot be read or decoded is also reported as a miss and removed so the
    /// next store replaces it.
    pub fn fetch(&self, source: &Path) -> CacheResult<Lookup> {
        let key = self.key_for(source)?;

        match self.store.get(&key) {
            Ok(content) => {
                counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                debug!(op = "cache::fetch", result = "hit", key = %key, "Cache hit");
                Ok(Lookup::Hit(content))
            }
            Err(CacheError::NotFound { .. }) => {
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                debug!(op = "cache::fetch", result = "miss", key = %key, "Cache miss");
                Ok(Lookup::Miss)
            }
            Err(CacheError::EntryCorrupt { reason, .. }) => Ok(self.discard(&key, &reason)),
            Err(err @ CacheError::Io { operation: "read", .. }) => {
                Ok(self.discard(&key, &err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Store rendered output for `source`, then trim the cache to its limit.
    ///
    /// Once the entry is written the call succeeds; a failed eviction pass is
    /// logged and reported as an empty [`EvictionReport`].
    pub fn store(&self, source: &Path, content: &str) -> CacheResult<StoreOutcome> {
        let key = self.key_for(source)?;
        self.store.put(&key, content)?;
        counter!(METRIC_CACHE_STORE_TOTAL).increment(1);
        debug!(
            op = "cache::store",
            result = "stored",
            key = %key,
            bytes = content.len(),
            "Stored rendered output"
        );

        let eviction = self.enforce_limit().unwrap_or_else(|err| {
            warn!(
                op = "cache::store",
                result = "evict_failed",
                key = %key,
                limit = self.limit,
                error = %err,
                "Eviction after store failed"
            );
            EvictionReport::default()
        });
        Ok(StoreOutcome { key, eviction })
    }

    pub fn enforce_limit(&self) -> CacheResult<EvictionReport> {
        enforce_limit(&self.store, self.limit)
    }

    pub fn stats(&self) -> CacheResult<CacheStats> {
        let entries = self.store.list_entries()?;
        Ok(CacheStats {
            directory: self.store.directory().to_path_buf(),
            entries: entries.len(),
            total_bytes: entries.iter().map(|entry| entry.len).sum(),
            limit: self.limit,
        })
    }

    fn discard(&self, key: &CacheKey, reason: &str) -> Lookup {
        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        warn!(
            op = "cache::fetch",
            result = "unreadable",
            key = %key,
            reason,
            "Discarding unreadable cache entry"
        );
        if let Err(err) = self.store.remove(key) {
            warn!(
                op = "cache::fetch",
                result = "remove_failed",
                key = %key,
                error = %err,
                "Failed to remove unreadable cache entry"
            );
        }
        Lookup::Miss
    }
}

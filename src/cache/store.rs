//! Directory-backed storage of rendered output, one file per entry.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use super::{
    error::{CacheError, CacheResult},
    fs::CacheFs,
    key::CacheKey,
};

/// Suffix that marks a file in the cache directory as an entry.
pub const ENTRY_SUFFIX: &str = ".cache";

/// An entry as observed by a single directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub key: CacheKey,
    pub modified: SystemTime,
    pub len: u64,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    fs: Arc<dyn CacheFs>,
    dir: PathBuf,
}

impl CacheStore {
    /// Open the store rooted at `dir`, creating the directory when missing.
    pub fn open(fs: Arc<dyn CacheFs>, dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let store = Self {
            fs,
            dir: dir.into(),
        };
        store.ensure_dir()?;
        Ok(store)
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}{ENTRY_SUFFIX}"))
    }

    pub fn exists(&self, key: &CacheKey) -> bool {
        self.fs.exists(&self.entry_path(key))
    }

    pub fn get(&self, key: &CacheKey) -> CacheResult<String> {
        let path = self.entry_path(key);
        let bytes = self.fs.read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => CacheError::not_found(key.as_str()),
            _ => CacheError::io("read", &path, err),
        })?;

        String::from_utf8(bytes)
            .map_err(|err| CacheError::corrupt(key.as_str(), format!("invalid UTF-8: {err}")))
    }

    /// Publish `content` under `key`, replacing any previous entry atomically.
    pub fn put(&self, key: &CacheKey, content: &str) -> CacheResult<()> {
        // The directory may have been removed externally since `open`.
        self.ensure_dir()?;

        let path = self.entry_path(key);
        self.fs
            .write_atomic(&path, content.as_bytes())
            .map_err(|err| CacheError::io("write", &path, err))
    }

    /// Delete the entry for `key`. Returns `false` if it was already gone.
    pub fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        let path = self.entry_path(key);
        match self.fs.remove(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(CacheError::io("remove", &path, err)),
        }
    }

    /// Snapshot of every entry currently in the directory, in no particular order.
    pub fn list_entries(&self) -> CacheResult<Vec<EntrySnapshot>> {
        let stamps = match self.fs.list(&self.dir) {
            Ok(stamps) => stamps,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CacheError::io("list", &self.dir, err)),
        };

        Ok(stamps
            .into_iter()
            .filter_map(|stamp| {
                let key = stamp
                    .name
                    .strip_suffix(ENTRY_SUFFIX)
                    .and_then(CacheKey::parse)?;
                Some(EntrySnapshot {
                    key,
                    modified: stamp.modified,
                    len: stamp.len,
                })
            })
            .collect())
    }

    fn ensure_dir(&self) -> CacheResult<()> {
        self.fs
            .ensure_dir(&self.dir)
            .map_err(|source| CacheError::StoreUnavailable {
                path: self.dir.clone(),
                source,
            })
    }
}

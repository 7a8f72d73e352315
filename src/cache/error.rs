use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures surfaced by the rendered-output cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The source file could not be opened or fully read while hashing.
    #[error("source file `{}` is unreadable: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The cache directory is missing and could not be created.
    #[error("cache directory `{}` is unavailable: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A stored entry exists but its content cannot be used.
    #[error("cache entry `{key}` is corrupt: {reason}")]
    EntryCorrupt { key: String, reason: String },
    /// No entry is stored under the key.
    #[error("cache entry `{key}` not found")]
    NotFound { key: String },
    #[error("cache {operation} failed for `{}`: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EntryCorrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

//! Narrow filesystem interface used by the cache store.
//!
//! Only the handful of operations the store needs are exposed, so tests can
//! swap the real disk for [`MemoryFs`](super::memory::MemoryFs) and control
//! modification times and failures deterministically.

use std::{
    fmt, fs,
    io::{self, ErrorKind, Write},
    path::Path,
    time::SystemTime,
};

/// A regular file seen while listing a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub name: String,
    pub modified: SystemTime,
    pub len: u64,
}

pub trait CacheFs: fmt::Debug + Send + Sync {
    /// Create `dir` and its parents if they do not exist.
    fn ensure_dir(&self, dir: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Publish `contents` at `path` in one step: readers observe either the
    /// previous file or the complete new one, never a partial write.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Point-in-time listing of regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> io::Result<Vec<FileStamp>>;

    /// Remove a file. Returns `ErrorKind::NotFound` if it is already gone.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`CacheFs`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFs;

impl CacheFs for DiskFs {
    fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // Temp files live beside the target so the final rename never crosses
        // filesystems, and their suffix keeps them out of entry listings.
        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(".tmp")
            .tempfile_in(parent)?;
        staged.write_all(contents)?;
        staged.as_file().sync_all()?;

        match staged.persist(path) {
            Ok(_) => Ok(()),
            // Another writer published the same key first; content is identical.
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err.error),
        }
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<FileStamp>> {
        let mut stamps = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                // Deleted between readdir and stat.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            if !metadata.is_file() {
                continue;
            }

            stamps.push(FileStamp {
                name,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                len: metadata.len(),
            });
        }

        Ok(stamps)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

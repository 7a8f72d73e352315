//! In-memory [`CacheFs`] for tests and dry runs.
//!
//! Every write stamps the file with the current value of a manual clock which
//! then ticks forward by one second, so insertion order maps onto strictly
//! increasing modification times unless a test overrides them.

use std::{
    collections::{BTreeMap, BTreeSet},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::{Duration, SystemTime},
};

use tracing::warn;

use super::fs::{CacheFs, FileStamp};

const CLOCK_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug)]
struct MemoryState {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, MemoryFile>,
    clock: SystemTime,
    read_only_dirs: BTreeSet<PathBuf>,
    protected_files: BTreeSet<PathBuf>,
    unreadable_files: BTreeSet<PathBuf>,
}

#[derive(Debug)]
pub struct MemoryFs {
    state: Mutex<MemoryState>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                dirs: BTreeSet::new(),
                files: BTreeMap::new(),
                clock: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
                read_only_dirs: BTreeSet::new(),
                protected_files: BTreeSet::new(),
                unreadable_files: BTreeSet::new(),
            }),
        }
    }

    /// Overwrite the modification time of an existing file.
    pub fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let mut state = self.lock("set_modified");
        let file = state
            .files
            .get_mut(path)
            .ok_or_else(|| not_found(path))?;
        file.modified = modified;
        Ok(())
    }

    /// Place raw bytes at `path` without going through the atomic write path.
    pub fn insert_raw(&self, path: &Path, contents: &[u8]) {
        let mut state = self.lock("insert_raw");
        if let Some(parent) = path.parent() {
            state.dirs.insert(parent.to_path_buf());
        }
        let modified = state.tick();
        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                contents: contents.to_vec(),
                modified,
            },
        );
    }

    /// Make `ensure_dir` fail with `PermissionDenied` for `dir` if it is missing.
    pub fn deny_dir_creation(&self, dir: &Path) {
        self.lock("deny_dir_creation")
            .read_only_dirs
            .insert(dir.to_path_buf());
    }

    /// Make `remove` fail with `PermissionDenied` for `path`.
    pub fn protect(&self, path: &Path) {
        self.lock("protect")
            .protected_files
            .insert(path.to_path_buf());
    }

    /// Make `read` fail with `PermissionDenied` for `path` while it still exists.
    pub fn fail_reads(&self, path: &Path) {
        self.lock("fail_reads")
            .unreadable_files
            .insert(path.to_path_buf());
    }

    /// Drop `dir` and everything below it, as if deleted by another process.
    pub fn remove_dir(&self, dir: &Path) {
        let mut state = self.lock("remove_dir");
        state.dirs.retain(|path| !path.starts_with(dir));
        state.files.retain(|path, _| !path.starts_with(dir));
    }

    // A test that panicked mid-operation leaves the maps usable; later
    // assertions see whatever that operation had already applied.
    fn lock(&self, op: &'static str) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(
                op,
                result = "poisoned_recovered",
                "In-memory cache filesystem lock was poisoned"
            );
            poisoned.into_inner()
        })
    }

    pub fn file_count(&self) -> usize {
        self.lock("file_count").files.len()
    }
}

impl MemoryState {
    fn tick(&mut self) -> SystemTime {
        let now = self.clock;
        self.clock += CLOCK_TICK;
        now
    }
}

impl CacheFs for MemoryFs {
    fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        let mut state = self.lock("ensure_dir");
        if state.dirs.contains(dir) {
            return Ok(());
        }
        if state.read_only_dirs.contains(dir) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("cannot create {}", dir.display()),
            ));
        }
        state.dirs.insert(dir.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock("exists").files.contains_key(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.lock("read");
        let file = state.files.get(path).ok_or_else(|| not_found(path))?;
        if state.unreadable_files.contains(path) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("{} is unreadable", path.display()),
            ));
        }
        Ok(file.contents.clone())
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut state = self.lock("write_atomic");
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        if !state.dirs.contains(parent) {
            return Err(not_found(parent));
        }
        let modified = state.tick();
        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                contents: contents.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<FileStamp>> {
        let state = self.lock("list");
        if !state.dirs.contains(dir) {
            return Err(not_found(dir));
        }

        Ok(state
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .filter_map(|(path, file)| {
                let name = path.file_name()?.to_str()?.to_string();
                Some(FileStamp {
                    name,
                    modified: file.modified,
                    len: file.contents.len() as u64,
                })
            })
            .collect())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock("remove");
        if state.protected_files.contains(path) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                format!("{} is protected", path.display()),
            ));
        }
        state
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(ErrorKind::NotFound, format!("{} not found", path.display()))
}

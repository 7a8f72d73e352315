//! Rendered-output cache
//!
//! Rendering a large measurement file is slow, so the HTML produced for it is
//! kept on disk and reused as long as the source bytes are unchanged.
//!
//! - **Keying**: the MD5 digest of a file's full contents, encoded as unpadded
//!   base32 so it is safe as a file name on every platform.
//! - **Storage**: one `<KEY>.cache` file per entry in a flat directory,
//!   published with a write-to-temp-then-rename so readers never observe a
//!   partial entry.
//! - **Eviction**: after every store, the oldest entries by modification time
//!   are removed until at most `limit` remain.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! directory = "cache"
//! limit = 100
//! ```

mod config;
mod digest;
mod error;
mod eviction;
mod facade;
mod fs;
mod key;
mod memory;
mod store;

pub use config::CacheConfig;
pub use digest::{ContentDigest, HASH_BLOCK_SIZE, digest_file, digest_reader};
pub use error::{CacheError, CacheResult};
pub use eviction::{EvictionReport, enforce_limit};
pub use facade::{CacheStats, Lookup, ResultCache, StoreOutcome};
pub use fs::{CacheFs, DiskFs, FileStamp};
pub use key::{CacheKey, KEY_LEN};
pub use memory::MemoryFs;
pub use store::{CacheStore, ENTRY_SUFFIX, EntrySnapshot};

pub(crate) use eviction::METRIC_CACHE_EVICT_TOTAL;
pub(crate) use facade::{METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL, METRIC_CACHE_STORE_TOTAL};

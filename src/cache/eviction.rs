//! Count-bounded eviction by least recent modification time.
//!
//! Entries are ordered by file modification time, not access time. Content is
//! never rewritten in place, so this is effectively least-recently-created;
//! an entry served a thousand times is as evictable as one never read.

use metrics::counter;
use tracing::{debug, warn};

use super::{
    error::CacheResult,
    store::{CacheStore, EntrySnapshot},
};

pub(crate) const METRIC_CACHE_EVICT_TOTAL: &str = "resultview_cache_evict_total";

/// Outcome of a single eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Entries seen in the listing snapshot.
    pub entries_before: usize,
    /// Entries this pass deleted.
    pub removed: usize,
    /// Entries that disappeared before this pass could delete them.
    pub already_gone: usize,
    /// Entries whose removal failed for reasons other than absence.
    pub failed: usize,
}

impl EvictionReport {
    pub fn remaining(&self) -> usize {
        self.entries_before - self.removed - self.already_gone
    }
}

/// Remove the oldest entries of `store` until at most `limit` remain.
///
/// Ties on modification time are broken by key so repeated passes over the
/// same snapshot pick the same victims. An entry that cannot be removed is
/// logged and skipped; the pass moves on to the next-oldest entry so the
/// bound still holds whenever enough entries are removable.
pub fn enforce_limit(store: &CacheStore, limit: usize) -> CacheResult<EvictionReport> {
    let mut entries = store.list_entries()?;
    let mut report = EvictionReport {
        entries_before: entries.len(),
        ..EvictionReport::default()
    };

    if entries.len() <= limit {
        return Ok(report);
    }

    sort_oldest_first(&mut entries);

    for entry in &entries {
        if report.remaining() <= limit {
            break;
        }

        match store.remove(&entry.key) {
            Ok(true) => {
                report.removed += 1;
                counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
                debug!(
                    op = "cache::enforce_limit",
                    result = "evicted",
                    key = %entry.key,
                    bytes = entry.len,
                    "Evicted cache entry"
                );
            }
            Ok(false) => {
                report.already_gone += 1;
                debug!(
                    op = "cache::enforce_limit",
                    result = "already_gone",
                    key = %entry.key,
                    "Cache entry vanished before eviction"
                );
            }
            Err(err) => {
                report.failed += 1;
                warn!(
                    op = "cache::enforce_limit",
                    result = "remove_failed",
                    key = %entry.key,
                    error = %err,
                    "Failed to evict cache entry; continuing with next oldest"
                );
            }
        }
    }

    Ok(report)
}

fn sort_oldest_first(entries: &mut [EntrySnapshot]) {
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.key.cmp(&b.key)));
}

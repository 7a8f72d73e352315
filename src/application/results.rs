//! Listing and rendering of result files, with the rendered-output cache in front.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Instant, SystemTime},
};

use metrics::{counter, histogram};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheError, Lookup, ResultCache},
    domain::results::ResultName,
    infra::error::InfraError,
};

use super::{error::AppError, render::render_result_bytes};

const METRIC_STORE_FAILED_TOTAL: &str = "resultview_cache_store_failed_total";
const METRIC_RENDER_MS: &str = "resultview_render_ms";
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");

/// A result file as shown on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFileSummary {
    pub name: String,
    pub size_bytes: u64,
    pub modified: Option<String>,
    /// Birth time; `None` where the platform or filesystem does not record it.
    pub created: Option<String>,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedResult {
    pub html: String,
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct ResultService {
    directory: PathBuf,
    cache: Option<ResultCache>,
}

impl ResultService {
    pub fn new(directory: impl Into<PathBuf>, cache: Option<ResultCache>) -> Self {
        Self {
            directory: directory.into(),
            cache,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    pub async fn list(&self) -> Result<Vec<ResultFileSummary>, AppError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.list_blocking())
            .await
            .map_err(|err| AppError::unexpected(format!("listing task failed: {err}")))?
    }

    pub async fn render(&self, name: &str) -> Result<RenderedResult, AppError> {
        let name = ResultName::parse(name)?;
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.render_named_blocking(&name))
            .await
            .map_err(|err| AppError::unexpected(format!("render task failed: {err}")))?
    }

    /// Every regular file in the results directory, sorted by name.
    pub fn list_blocking(&self) -> Result<Vec<ResultFileSummary>, AppError> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    op = "results::list",
                    directory = %self.directory.display(),
                    "Results directory does not exist"
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(InfraError::from(err).into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(InfraError::from)?;
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };

            files.push(ResultFileSummary {
                cached: self.is_cached(&entry.path()),
                modified: metadata.modified().ok().and_then(format_timestamp),
                created: metadata.created().ok().and_then(format_timestamp),
                size_bytes: metadata.len(),
                name,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub fn render_named_blocking(&self, name: &ResultName) -> Result<RenderedResult, AppError> {
        let path = self.directory.join(name.as_str());
        if !path.is_file() {
            return Err(AppError::NotFound);
        }
        self.render_path_blocking(&path, name.as_str())
    }

    /// Render `path`, serving from and populating the cache when enabled.
    ///
    /// Cache failures never prevent a render: read errors fall through to a
    /// fresh render and store errors are logged and counted.
    pub fn render_path_blocking(&self, path: &Path, title: &str) -> Result<RenderedResult, AppError> {
        if let Some(cache) = self.cache.as_ref() {
            match cache.fetch(path) {
                Ok(Lookup::Hit(html)) => {
                    return Ok(RenderedResult {
                        html,
                        from_cache: true,
                    });
                }
                Ok(Lookup::Miss) => {}
                Err(err @ CacheError::SourceUnreadable { .. }) => {
                    return Err(source_error(err));
                }
                Err(err) => {
                    warn!(
                        op = "results::render",
                        result = "cache_read_failed",
                        path = %path.display(),
                        error = %err,
                        "Cache lookup failed; rendering without it"
                    );
                }
            }
        }

        let bytes = fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => AppError::NotFound,
            _ => AppError::from(InfraError::from(err)),
        })?;

        let started = Instant::now();
        let html = render_result_bytes(title, &bytes)?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_RENDER_MS).record(elapsed_ms);
        info!(
            op = "results::render",
            result = "rendered",
            path = %path.display(),
            records_bytes = bytes.len(),
            elapsed_ms,
            "Rendered result file"
        );

        if let Some(cache) = self.cache.as_ref() {
            match cache.store(path, &html) {
                Ok(outcome) => debug!(
                    op = "results::render",
                    result = "stored",
                    key = %outcome.key,
                    evicted = outcome.eviction.removed,
                    "Cached rendered output"
                ),
                Err(err) => {
                    counter!(METRIC_STORE_FAILED_TOTAL).increment(1);
                    warn!(
                        op = "results::render",
                        result = "store_failed",
                        path = %path.display(),
                        error = %err,
                        "Failed to cache rendered output"
                    );
                }
            }
        }

        Ok(RenderedResult {
            html,
            from_cache: false,
        })
    }

    fn is_cached(&self, path: &Path) -> bool {
        let Some(cache) = self.cache.as_ref() else {
            return false;
        };
        cache.is_cached(path).unwrap_or_else(|err| {
            debug!(
                op = "results::list",
                path = %path.display(),
                error = %err,
                "Could not check cache state"
            );
            false
        })
    }
}

fn source_error(err: CacheError) -> AppError {
    match &err {
        CacheError::SourceUnreadable { source, .. } if source.kind() == ErrorKind::NotFound => {
            AppError::NotFound
        }
        _ => AppError::from(err),
    }
}

fn format_timestamp(at: SystemTime) -> Option<String> {
    OffsetDateTime::from(at).format(TIMESTAMP_FORMAT).ok()
}

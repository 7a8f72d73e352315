use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "resultview_cache_hit_total",
            Unit::Count,
            "Total number of rendered-output cache hits."
        );
        describe_counter!(
            "resultview_cache_miss_total",
            Unit::Count,
            "Total number of rendered-output cache misses, corrupt entries included."
        );
        describe_counter!(
            "resultview_cache_store_total",
            Unit::Count,
            "Total number of rendered tables written to the cache."
        );
        describe_counter!(
            "resultview_cache_store_failed_total",
            Unit::Count,
            "Total number of cache writes that failed and were skipped."
        );
        describe_counter!(
            "resultview_cache_evict_total",
            Unit::Count,
            "Total number of cache entries evicted to honour the entry limit."
        );
        describe_histogram!(
            "resultview_render_ms",
            Unit::Milliseconds,
            "Time spent turning a result file into an HTML table."
        );
    });
}

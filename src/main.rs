use std::{io::Write, process};

use resultview::{
    application::{error::AppError, results::ResultService},
    cache::{CacheConfig, ResultCache},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Render(args) => run_render(settings, args).await,
        config::Command::Cache(args) => run_cache(settings, args).await,
    }
}

/// Open the cache for request handling. A cache that cannot be opened is
/// logged and skipped so results are still served.
fn open_serving_cache(settings: &config::Settings) -> Option<ResultCache> {
    let cache_config = CacheConfig::from(&settings.cache);
    if !cache_config.enabled {
        info!(target = "resultview::cache", "Rendered-output cache disabled");
        return None;
    }

    match ResultCache::open(&cache_config) {
        Ok(cache) => {
            info!(
                target = "resultview::cache",
                directory = %cache_config.directory.display(),
                limit = cache_config.limit,
                "Rendered-output cache ready"
            );
            Some(cache)
        }
        Err(err) => {
            warn!(
                target = "resultview::cache",
                directory = %cache_config.directory.display(),
                error = %err,
                "Cache unavailable; rendering every request"
            );
            None
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let results = ResultService::new(
        settings.results.directory.clone(),
        open_serving_cache(&settings),
    );
    let router = http::build_router(HttpState::new(results));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "resultview::serve",
        addr = %settings.server.addr,
        results = %settings.results.directory.display(),
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "resultview::serve", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "resultview::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_render(settings: config::Settings, args: config::RenderArgs) -> Result<(), AppError> {
    let results = ResultService::new(
        settings.results.directory.clone(),
        open_serving_cache(&settings),
    );
    let file = args.file;
    let title = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("results")
        .to_string();

    let rendered = tokio::task::spawn_blocking(move || {
        if !file.is_file() {
            return Err(AppError::NotFound);
        }
        results.render_path_blocking(&file, &title)
    })
    .await
    .map_err(|err| AppError::unexpected(format!("render task failed: {err}")))??;

    info!(
        target = "resultview::render",
        from_cache = rendered.from_cache,
        bytes = rendered.html.len(),
        "Rendered result file"
    );

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.html.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn run_cache(settings: config::Settings, args: config::CacheArgs) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);

    tokio::task::spawn_blocking(move || -> Result<(), AppError> {
        let cache = ResultCache::open(&cache_config)?;
        match args.command {
            config::CacheCommand::Stats => {
                let stats = cache.stats()?;
                println!("directory: {}", stats.directory.display());
                println!("enabled:   {}", cache_config.enabled);
                println!("entries:   {}", stats.entries);
                println!("bytes:     {}", stats.total_bytes);
                println!("limit:     {}", stats.limit);
            }
            config::CacheCommand::Prune => {
                let report = cache.enforce_limit()?;
                info!(
                    target = "resultview::cache",
                    before = report.entries_before,
                    removed = report.removed,
                    failed = report.failed,
                    "Cache pruned"
                );
                println!(
                    "removed {} of {} entries ({} remaining, {} failed)",
                    report.removed,
                    report.entries_before,
                    report.remaining(),
                    report.failed
                );
            }
        }
        Ok(())
    })
    .await
    .map_err(|err| AppError::unexpected(format!("cache task failed: {err}")))?
}

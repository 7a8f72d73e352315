//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "resultview";
const ENV_PREFIX: &str = "RESULTVIEW";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_RESULTS_DIR: &str = "results";
const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_CACHE_LIMIT: usize = 100;

/// Command-line arguments for the resultview binary.
#[derive(Debug, Parser)]
#[command(
    name = "resultview",
    version,
    about = "Browse censorship measurement results as HTML tables"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RESULTVIEW_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Render one result file to stdout, going through the cache.
    Render(RenderArgs),
    /// Inspect or maintain the rendered-output cache.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Override the listener host.
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Result file to render.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Print entry count, total size and limit.
    Stats,
    /// Evict the oldest entries until the configured limit holds.
    Prune,
}

/// Overrides accepted by every command.
#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the directory holding result files.
    #[arg(long = "results-directory", value_name = "PATH", global = true)]
    pub results_directory: Option<PathBuf>,

    /// Enable or disable the rendered-output cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache directory.
    #[arg(long = "cache-directory", value_name = "PATH", global = true)]
    pub cache_directory: Option<PathBuf>,

    /// Override the maximum number of cache entries.
    #[arg(long = "cache-limit", value_name = "COUNT", global = true)]
    pub cache_limit: Option<usize>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub results: ResultsSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ResultsSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub directory: PathBuf,
    pub limit: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_overrides(&cli.overrides);
    if let Some(Command::Serve(args)) = cli.command.as_ref() {
        raw.apply_serve_overrides(args);
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    results: RawResultsSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(directory) = overrides.results_directory.as_ref() {
            self.results.directory = Some(directory.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(directory) = overrides.cache_directory.as_ref() {
            self.cache.directory = Some(directory.clone());
        }
        if let Some(limit) = overrides.cache_limit {
            self.cache.limit = Some(limit);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeArgs) {
        if let Some(host) = overrides.host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            results,
            cache,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            results: build_results_settings(results)?,
            cache: build_cache_settings(cache)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_results_settings(results: RawResultsSettings) -> Result<ResultsSettings, LoadError> {
    let directory = non_empty_path(
        results.directory,
        DEFAULT_RESULTS_DIR,
        "results.directory",
    )?;
    Ok(ResultsSettings { directory })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let directory = non_empty_path(cache.directory, DEFAULT_CACHE_DIR, "cache.directory")?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        directory,
        limit: cache.limit.unwrap_or(DEFAULT_CACHE_LIMIT),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawResultsSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    directory: Option<PathBuf>,
    limit: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(matches!(settings.logging.format, LogFormat::Compact));
        assert_eq!(settings.results.directory, PathBuf::from("results"));
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.directory, PathBuf::from("cache"));
        assert_eq!(settings.cache.limit, 100);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.cache.limit = Some(10);

        raw.apply_overrides(&Overrides {
            log_level: Some("debug".to_string()),
            cache_limit: Some(3),
            ..Default::default()
        });
        raw.apply_serve_overrides(&ServeArgs {
            port: Some(4321),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(settings.cache.limit, 3);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        raw.apply_overrides(&Overrides {
            log_json: Some(true),
            ..Default::default()
        });
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero port");
        assert!(matches!(err, LoadError::Invalid { key: "server.port", .. }));
    }

    #[test]
    fn empty_cache_directory_is_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.directory = Some(PathBuf::new());

        let err = Settings::from_raw(raw).expect_err("empty dir");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.directory",
                ..
            }
        ));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("loud".to_string());

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["resultview"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(ServeArgs::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_render_arguments() {
        let args = CliArgs::parse_from([
            "resultview",
            "render",
            "--cache-enabled",
            "false",
            "results/a.json",
        ]);

        assert_eq!(args.overrides.cache_enabled, Some(false));
        match args.command.expect("render command") {
            Command::Render(render) => {
                assert_eq!(render.file, std::path::Path::new("results/a.json"));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_cache_prune_arguments() {
        let args = CliArgs::parse_from(["resultview", "cache", "prune", "--cache-limit", "5"]);

        assert_eq!(args.overrides.cache_limit, Some(5));
        match args.command.expect("cache command") {
            Command::Cache(cache) => assert!(matches!(cache.command, CacheCommand::Prune)),
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_arguments() {
        let args = CliArgs::parse_from(["resultview", "serve", "--port", "8080"]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => assert_eq!(serve.port, Some(8080)),
            _ => panic!("wrong command parsed"),
        }
    }
}

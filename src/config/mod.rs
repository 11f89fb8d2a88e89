//! Configuration layer: typed settings with layered precedence (file → env
//! → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, time::Duration};

use clap::{Args, Parser, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "gaffer";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3100;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_REDIS_CONNECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REDIS_RESPONSE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REDIS_RECONNECT_RETRIES: usize = 2;
const DEFAULT_UPSTREAM_BASE_URL: &str = "https://fantasy.premierleague.com/api";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_CRON: &str = "0 0 6 * * *";
const DEFAULT_LIVE_POLL_CRON: &str = "0 */5 * * * *";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Command-line arguments for the gaffer binary.
#[derive(Debug, Parser)]
#[command(name = "gaffer", version, about = "FPL caching and sync service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GAFFER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CliOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,

    /// Shorten cache lifetimes for development.
    #[arg(
        long = "dev-mode",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub dev_mode: Option<bool>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub upstream: UpstreamSettings,
    pub cache: CacheSettings,
    pub jobs: JobsSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: NonZeroU32::new(DEFAULT_DB_MAX_CONNECTIONS)
                .expect("default max connections is non-zero"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
    pub connect_timeout_ms: u64,
    pub response_timeout_ms: u64,
    pub reconnect_retries: usize,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            connect_timeout_ms: DEFAULT_REDIS_CONNECT_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_REDIS_RESPONSE_TIMEOUT_MS,
            reconnect_retries: DEFAULT_REDIS_RECONNECT_RETRIES,
        }
    }
}

impl RedisSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

impl UpstreamSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheSettings {
    /// Shorten every cache lifetime for faster iteration.
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsSettings {
    /// Cron expression for the daily full sync.
    pub sync_cron: String,
    /// Cron expression for the in-progress-match poll.
    pub live_poll_cron: String,
}

impl Default for JobsSettings {
    fn default() -> Self {
        Self {
            sync_cron: DEFAULT_SYNC_CRON.to_string(),
            live_poll_cron: DEFAULT_LIVE_POLL_CRON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl LogLevel {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> LevelFilter {
        self.level.into()
    }
}

/// Parse CLI arguments and load the layered configuration.
pub fn load_with_cli() -> Result<(CliArgs, Settings), ConfigError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings: default file, local file, optional explicit file,
/// `GAFFER_`-prefixed environment, then CLI overrides.
pub fn load(cli: &CliArgs) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(File::from(path.clone()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("GAFFER").separator("__"));

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    apply_overrides(&mut settings, &cli.overrides);
    Ok(settings)
}

fn apply_overrides(settings: &mut Settings, overrides: &CliOverrides) {
    if let Some(host) = &overrides.server_host {
        settings.server.host = host.clone();
    }
    if let Some(port) = overrides.server_port {
        settings.server.port = port;
    }
    if let Some(url) = &overrides.database_url {
        settings.database.url = Some(url.clone());
    }
    if let Some(url) = &overrides.redis_url {
        settings.redis.url = url.clone();
    }
    if let Some(dev_mode) = overrides.dev_mode {
        settings.cache.dev_mode = dev_mode;
    }
    if let Some(level) = overrides
        .log_level
        .as_deref()
        .and_then(LogLevel::from_name)
    {
        settings.logging.level = level;
    }
    if let Some(json) = overrides.log_json {
        settings.logging.format = if json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.redis.url, DEFAULT_REDIS_URL);
        assert_eq!(settings.upstream.base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert!(!settings.cache.dev_mode);
        assert_eq!(settings.jobs.sync_cron, DEFAULT_SYNC_CRON);
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert!(settings.server.addr().is_ok());
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let mut settings = Settings::default();
        let overrides = CliOverrides {
            server_host: Some("0.0.0.0".to_string()),
            server_port: Some(8080),
            database_url: Some("postgres://localhost/gaffer".to_string()),
            redis_url: Some("redis://cache:6379".to_string()),
            dev_mode: Some(true),
            log_level: Some("debug".to_string()),
            log_json: Some(true),
        };

        apply_overrides(&mut settings, &overrides);

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.database.url.as_deref(),
            Some("postgres://localhost/gaffer")
        );
        assert_eq!(settings.redis.url, "redis://cache:6379");
        assert!(settings.cache.dev_mode);
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_log_level_is_ignored() {
        let mut settings = Settings::default();
        let overrides = CliOverrides {
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        apply_overrides(&mut settings, &overrides);
        assert_eq!(settings.logging.level, LogLevel::Info);
    }

    #[test]
    fn settings_deserialize_from_toml() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [redis]
            url = "redis://cache:6379"
            reconnect_retries = 5

            [cache]
            dev_mode = true

            [logging]
            level = "warn"
            format = "json"
        "#;
        let settings: Settings = Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .expect("config builds")
            .try_deserialize()
            .expect("settings deserialize");

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.redis.reconnect_retries, 5);
        assert!(settings.cache.dev_mode);
        assert_eq!(settings.logging.level, LogLevel::Warn);
        assert_eq!(settings.logging.format, LogFormat::Json);
        // Sections absent from the file keep their defaults.
        assert_eq!(settings.upstream.base_url, DEFAULT_UPSTREAM_BASE_URL);
    }
}

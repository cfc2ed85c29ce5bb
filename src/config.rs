//! Service configuration loader - parses rainmon.toml
//!
//! Keeps the API endpoint, poll cadence, storage backend, notification
//! target and logging options out of the code so they can be changed
//! without recompiling. Every section is optional; a missing file means
//! "all defaults".
//!
//! Secrets stay in the environment (`.env` is honoured):
//!   DATABASE_URL          - PostgreSQL backend
//!   RAINMON_PUBSUB_TOKEN  - bearer token for the Pub/Sub notifier

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::vrain::DEFAULT_API_URL;
use crate::logging::LogLevel;
use crate::notify::DEFAULT_SUMMARY_LIMIT;

pub const DEFAULT_CONFIG_PATH: &str = "rainmon.toml";
pub const PUBSUB_TOKEN_ENV: &str = "RAINMON_PUBSUB_TOKEN";

// ---------------------------------------------------------------------------
// TOML structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub api: ApiConfig,
    pub daemon: DaemonSection,
    pub storage: StorageConfig,
    pub endpoint: EndpointConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    /// Overall request timeout; expiry counts as a fetch failure.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonSection {
    pub poll_interval_minutes: u64,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// State file for the `file` backend.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: PathBuf::from("rainmon_state.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// Serve the read-only view on this port; disabled when absent.
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub summary_limit: usize,
    /// Pub/Sub `topics/*:publish` URL. Summaries are only logged when absent.
    pub pubsub_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            pubsub_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> LogLevel {
        LogLevel::parse(&self.level).unwrap_or(LogLevel::Info)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(path, e) => write!(f, "Failed to read {}: {}", path.display(), e),
            ConfigError::Parse(path, e) => write!(f, "Failed to parse {}: {}", path.display(), e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses configuration text and validates it.
pub fn parse_config(contents: &str, origin: &Path) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig =
        toml::from_str(contents).map_err(|e| ConfigError::Parse(origin.to_path_buf(), e))?;
    validate(&config)?;
    Ok(config)
}

/// Loads configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if !path.exists() {
        return Ok(ServiceConfig::default());
    }

    let contents =
        fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    parse_config(&contents, path)
}

fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.api.url.trim().is_empty() {
        return Err(ConfigError::Invalid("api.url must not be empty".into()));
    }
    if config.api.timeout_secs == 0 {
        return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
    }
    if config.daemon.poll_interval_minutes == 0 {
        return Err(ConfigError::Invalid(
            "daemon.poll_interval_minutes must be positive".into(),
        ));
    }
    if config.notify.summary_limit == 0 {
        return Err(ConfigError::Invalid("notify.summary_limit must be positive".into()));
    }
    if LogLevel::parse(&config.logging.level).is_none() {
        return Err(ConfigError::Invalid(format!(
            "logging.level '{}' is not one of debug, info, warn, error",
            config.logging.level
        )));
    }
    if config.storage.backend == StorageBackend::File
        && config.storage.path.as_os_str().is_empty()
    {
        return Err(ConfigError::Invalid("storage.path is required for the file backend".into()));
    }
    Ok(())
}

/// Pub/Sub bearer token from the environment (after loading `.env`).
pub fn pubsub_token() -> Option<String> {
    dotenv::dotenv().ok();
    std::env::var(PUBSUB_TOKEN_ENV).ok().filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ServiceConfig, ConfigError> {
        parse_config(text, Path::new("test.toml"))
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert_eq!(config.daemon.poll_interval_minutes, 15);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.notify.summary_limit, 3);
        assert!(config.endpoint.port.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = parse(
            r#"
            [api]
            url = "https://data.vrain.vn/public/current/26.json"

            [storage]
            backend = "postgres"

            [endpoint]
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.api.url, "https://data.vrain.vn/public/current/26.json");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.endpoint.port, Some(8080));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = parse("[daemon]\npoll_interval_minutes = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_summary_limit_is_rejected() {
        let result = parse("[notify]\nsummary_limit = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(m)) if m.contains("summary_limit")));
        assert!(parse("[notify]\nsummary_limit = 1\n").is_ok());
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result = parse("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(m)) if m.contains("loud")));
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        let result = parse("[storage]\nbackend = \"redis\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_shipped_config_loads() {
        let config = load_config(Path::new(DEFAULT_CONFIG_PATH))
            .expect("rainmon.toml in the project root should be valid");
        assert_eq!(config.daemon.poll_interval_minutes, 15);
        assert_eq!(config.logging.min_level(), LogLevel::Info);
    }
}

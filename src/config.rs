//! Configuration management for AURN Fetcher
//!
//! This module provides TOML configuration with zero-config defaults,
//! multi-location lookup and conversion into the runtime configuration
//! structs used by the client, pipeline and sinks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::ClientConfig;
use crate::app::coordinator::PipelineConfig;
use crate::app::models::{AllowList, NetworkProfile};
use crate::app::sink::InfluxSettings;
use crate::constants::{env as env_constants, http, limits, logging, network, pipeline, sink, ukair};
use crate::errors::{ConfigError, ConfigResult};

/// Directory and file name used under the user's config directory
const CONFIG_DIR_NAME: &str = "aurn-fetcher";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// UK-AIR source locations
    pub source: SourceConfig,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Pipeline settings
    pub pipeline: PipelineConfigToml,
    /// Record sink settings
    pub sink: SinkConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Per-network measurement name and pollutant allow-list
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(network::DEFAULT_NAME.to_string(), NetworkConfig::default());

        Self {
            source: SourceConfig::default(),
            client: ClientConfigToml::default(),
            pipeline: PipelineConfigToml::default(),
            sink: SinkConfig::default(),
            logging: LoggingConfig::default(),
            networks,
        }
    }
}

/// Where stations and measurements are read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the UK-AIR site
    pub domain: String,
    /// Listing location: path under `domain` or absolute URL, CSV or
    /// results page linking to it
    pub listing_url: String,
    /// Site-info path prefix, followed by the UK-AIR ID
    pub site_info_path: String,
    /// Lines before the header row in measurement files
    pub preamble_lines: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            domain: ukair::DOMAIN.to_string(),
            listing_url: ukair::METADATA_SEARCH.to_string(),
            site_info_path: ukair::SITE_INFO.to_string(),
            preamble_lines: ukair::PREAMBLE_LINES,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retry attempts for 429, 503 and transport failures
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(http::TCP_KEEPALIVE.as_secs()),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay_ms: limits::RETRY_BASE_DELAY_MS,
        }
    }
}

/// TOML-friendly pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfigToml {
    /// Number of concurrent (station, year) units
    pub worker_count: usize,
    /// Enable progress bar display
    pub enable_progress_bar: bool,
    /// Directory receiving cleaned tables as CSV
    pub debug_output: Option<PathBuf>,
}

impl Default for PipelineConfigToml {
    fn default() -> Self {
        Self {
            worker_count: pipeline::DEFAULT_WORKER_COUNT,
            enable_progress_bar: true,
            debug_output: None,
        }
    }
}

/// Which sink receives records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// InfluxDB 2.x write API
    #[default]
    Influx,
    /// Line protocol file
    File,
    /// Count and drop (dry run)
    Discard,
}

/// Record sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Maximum records per submission
    pub batch_size: usize,
    /// InfluxDB base URL
    pub influx_url: String,
    pub org: String,
    pub bucket: String,
    /// API token; falls back to the INFLUX_TOKEN environment variable
    pub token: Option<String>,
    /// Output file for the file sink
    pub output: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            batch_size: sink::DEFAULT_BATCH_SIZE,
            influx_url: sink::DEFAULT_INFLUX_URL.to_string(),
            org: String::new(),
            bucket: String::new(),
            token: None,
            output: PathBuf::from("aurn.lp"),
        }
    }
}

/// Measurement name and allow-list for one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Measurement name written to the database
    pub measurement: String,
    /// Canonical pollutant names to keep; empty keeps all
    pub pollutants: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            measurement: network::DEFAULT_MEASUREMENT.to_string(),
            pollutants: network::DEFAULT_POLLUTANTS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the first file found, or defaults
    ///
    /// An explicitly given path must exist.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            PathBuf::from("./aurn-fetcher.toml"),
            PathBuf::from("./config.toml"),
        ];
        if let Ok(user_path) = Self::default_config_path() {
            search_paths.push(user_path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        if let Some(path) = &found {
            debug!("Found config file: {}", path.display());
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_dir".to_string(),
            value: String::new(),
            reason: "Could not determine user config directory".to_string(),
        })?;

        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig =
            toml::from_str(&content).map_err(|source| ConfigError::InvalidFormat {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write the commented default configuration
    ///
    /// Returns the path and whether a file was written; an existing file is
    /// kept unless `force` is set.
    pub async fn initialize(path: Option<PathBuf>, force: bool) -> ConfigResult<(PathBuf, bool)> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if config_path.exists() && !force {
            return Ok((config_path, false));
        }

        let io_error = |source| ConfigError::Io {
            path: config_path.clone(),
            source,
        };
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
            }
        }
        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(io_error)?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok((config_path, true))
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            value: String::new(),
            reason: e.to_string(),
        })
    }

    /// Check values that would make a run impossible
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, value: String, reason: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.client.rate_limit_rps == 0 {
            return Err(invalid(
                "client.rate_limit_rps",
                "0".to_string(),
                "Rate limit must be at least 1 request per second",
            ));
        }
        self.pipeline
            .to_runtime_config(self.sink.batch_size)
            .validate()
            .map_err(|reason| {
                invalid(
                    "pipeline",
                    format!(
                        "worker_count={}, batch_size={}",
                        self.pipeline.worker_count, self.sink.batch_size
                    ),
                    &reason,
                )
            })?;
        if url::Url::parse(&self.source.domain).is_err() {
            return Err(invalid(
                "source.domain",
                self.source.domain.clone(),
                "Must be an absolute URL",
            ));
        }
        if self.networks.is_empty() {
            return Err(invalid(
                "networks",
                String::new(),
                "At least one network must be configured",
            ));
        }

        Ok(())
    }

    /// Resolve a configured network into its runtime profile
    pub fn network(&self, name: &str) -> ConfigResult<NetworkProfile> {
        let entry = self
            .networks
            .get(name)
            .ok_or_else(|| ConfigError::UnknownNetwork {
                name: name.to_string(),
                known: self.networks.keys().cloned().collect(),
            })?;

        Ok(NetworkProfile {
            name: name.to_string(),
            measurement: entry.measurement.clone(),
            allow_list: AllowList::new(&entry.pollutants),
        })
    }

    /// InfluxDB settings, taking the token from the environment when unset
    pub fn influx_settings(&self) -> InfluxSettings {
        let token = self
            .sink
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(env_constants::INFLUX_TOKEN).ok());

        InfluxSettings {
            url: self.sink.influx_url.clone(),
            org: self.sink.org.clone(),
            bucket: self.sink.bucket.clone(),
            token,
        }
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        let pollutants = network::DEFAULT_POLLUTANTS
            .iter()
            .map(|p| format!("    \"{}\",", p))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"# AURN Fetcher Configuration
# You can customize any of these settings to suit your needs.

[source]
# UK-AIR site and page locations
domain = "{domain}"
listing_url = "{listing}"
site_info_path = "{site_info}"
preamble_lines = {preamble}

[client]
# HTTP client settings
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = 90
pool_max_per_host = 8
request_timeout_secs = 60
connect_timeout_secs = 30
rate_limit_rps = {rps}
max_retries = {retries}
retry_base_delay_ms = {retry_delay}

[pipeline]
# Concurrent (station, year) units
worker_count = {workers}
enable_progress_bar = true
# debug_output = "./debug"  # Uncomment to save cleaned tables as CSV

[sink]
kind = "influx"  # influx, file, discard
batch_size = {batch}
influx_url = "{influx_url}"
org = ""
bucket = ""
# token = ""  # Or set INFLUX_TOKEN in the environment or .env
output = "aurn.lp"  # Used by the file sink

[logging]
level = "info"  # error, warn, info, debug, trace

[networks.{network_name}]
measurement = "{measurement}"
# Canonical pollutant names to keep; an empty list keeps all
pollutants = [
{pollutants}
]
"#,
            domain = ukair::DOMAIN,
            listing = ukair::METADATA_SEARCH,
            site_info = ukair::SITE_INFO,
            preamble = ukair::PREAMBLE_LINES,
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            retries = limits::MAX_RETRIES,
            retry_delay = limits::RETRY_BASE_DELAY_MS,
            workers = pipeline::DEFAULT_WORKER_COUNT,
            batch = sink::DEFAULT_BATCH_SIZE,
            influx_url = sink::DEFAULT_INFLUX_URL,
            network_name = network::DEFAULT_NAME,
            measurement = network::DEFAULT_MEASUREMENT,
            pollutants = pollutants,
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

impl PipelineConfigToml {
    /// Convert to runtime PipelineConfig
    pub fn to_runtime_config(&self, batch_size: usize) -> PipelineConfig {
        PipelineConfig {
            worker_count: self.worker_count,
            batch_size,
            enable_progress_bar: self.enable_progress_bar,
            debug_output: self.debug_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();

        assert_eq!(config.pipeline.worker_count, pipeline::DEFAULT_WORKER_COUNT);
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sink.kind, SinkKind::Influx);
        assert!(config.networks.contains_key("AURN"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content();

        let parsed: AppConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed, AppConfig::default());
        assert!(content.contains("# AURN Fetcher Configuration"));
        assert!(content.contains("[networks.AURN]"));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let test_config = r#"
[pipeline]
worker_count = 2

[sink]
kind = "file"
output = "out.lp"

[logging]
level = "debug"

[networks.AURN]
measurement = "AURN hourly"
pollutants = []
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load(Some(config_path)).await.unwrap();

        assert_eq!(config.pipeline.worker_count, 2);
        assert_eq!(config.sink.kind, SinkKind::File);
        assert_eq!(config.sink.output, PathBuf::from("out.lp"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.sink.batch_size, sink::DEFAULT_BATCH_SIZE);

        let profile = config.network("AURN").unwrap();
        assert_eq!(profile.measurement, "AURN hourly");
        assert!(profile.allow_list.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[pipeline\nworker_count = ")
            .await
            .unwrap();

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::InvalidFormat { .. })));
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("zero.toml");
        tokio::fs::write(&config_path, "[pipeline]\nworker_count = 0\n")
            .await
            .unwrap();

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_network() {
        let config = AppConfig::default();
        match config.network("LAQN") {
            Err(ConfigError::UnknownNetwork { name, known }) => {
                assert_eq!(name, "LAQN");
                assert_eq!(known, vec!["AURN".to_string()]);
            }
            other => panic!("expected UnknownNetwork, got {:?}", other),
        }
    }

    #[test]
    fn test_default_network_profile() {
        let profile = AppConfig::default().network("AURN").unwrap();
        assert_eq!(profile.measurement, "Automatic Urban Rural Network");
        assert!(profile.allow_list.permits("Ozone"));
        assert!(profile.allow_list.permits("PM2.5 particulate matter"));
        assert!(!profile.allow_list.permits("Sulphur dioxide"));
    }

    #[test]
    fn test_influx_token_from_file_wins() {
        let mut config = AppConfig::default();
        config.sink.token = Some("from-file".to_string());
        assert_eq!(
            config.influx_settings().token.as_deref(),
            Some("from-file")
        );
    }

    #[tokio::test]
    async fn test_initialize_writes_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let (written_path, created) = AppConfig::initialize(Some(path.clone()), false)
            .await
            .unwrap();
        assert_eq!(written_path, path);
        assert!(created);

        let (_, created_again) = AppConfig::initialize(Some(path.clone()), false)
            .await
            .unwrap();
        assert!(!created_again);

        let loaded = AppConfig::load(Some(path)).await.unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_runtime_conversion() {
        let config = AppConfig::default();
        let client = config.client.to_runtime_config();
        assert_eq!(client.request_timeout, http::DEFAULT_TIMEOUT);
        assert_eq!(client.max_retries, limits::MAX_RETRIES);

        let pipeline = config.pipeline.to_runtime_config(config.sink.batch_size);
        assert_eq!(pipeline.batch_size, sink::DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_config_renders_as_toml() {
        let rendered = AppConfig::default().to_toml_string().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }
}

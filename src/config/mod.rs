//! Configuration management for annosync
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API endpoint configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// File transfer configuration
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the annotation platform API, with trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// File transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Seconds between polls of an asynchronous operation's status
    #[serde(default = "default_status_check_period")]
    pub status_check_period: u64,

    /// Uploads larger than this many bytes are sent as a chunked session
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Buffer size for streaming downloads to disk, in bytes
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    /// Render console progress bars for transfers
    #[serde(default = "default_progress_bars")]
    pub progress_bars: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive string understood by `tracing_subscriber`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080/api/".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("annosync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_status_check_period() -> u64 {
    5
}

fn default_chunk_size() -> u64 {
    100 * 1024 * 1024
}

fn default_write_buffer_size() -> usize {
    1024 * 1024
}

fn default_progress_bars() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            status_check_period: default_status_check_period(),
            chunk_size: default_chunk_size(),
            write_buffer_size: default_write_buffer_size(),
            progress_bars: default_progress_bars(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from all sources with proper precedence
    ///
    /// Reads the default config file if present, then applies environment
    /// variable overrides.
    ///
    /// # Returns
    /// * `Result<Config>` - Merged configuration or error
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".annosync")
            .join("config.toml")
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables are prefixed with ANNOSYNC_
    /// Example: ANNOSYNC_STATUS_CHECK_PERIOD=10
    ///
    /// # Returns
    /// * `Result<()>` - Success or error for unparsable values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("ANNOSYNC_BASE_URL") {
            self.api.base_url = value;
        }
        if let Ok(value) = std::env::var("ANNOSYNC_REQUEST_TIMEOUT") {
            self.api.request_timeout = parse_env("ANNOSYNC_REQUEST_TIMEOUT", &value)?;
        }
        if let Ok(value) = std::env::var("ANNOSYNC_STATUS_CHECK_PERIOD") {
            self.transfer.status_check_period = parse_env("ANNOSYNC_STATUS_CHECK_PERIOD", &value)?;
        }
        if let Ok(value) = std::env::var("ANNOSYNC_CHUNK_SIZE") {
            self.transfer.chunk_size = parse_env("ANNOSYNC_CHUNK_SIZE", &value)?;
        }
        if let Ok(value) = std::env::var("ANNOSYNC_PROGRESS_BARS") {
            self.transfer.progress_bars = parse_env("ANNOSYNC_PROGRESS_BARS", &value)?;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.transfer.status_check_period == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer.status_check_period".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer.chunk_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Get the per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout)
    }

    /// Get the status poll interval as Duration
    pub fn status_check_period(&self) -> Duration {
        Duration::from_secs(self.transfer.status_check_period)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: name.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

/// Initialize the global tracing subscriber from the logging configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call more
/// than once; subsequent calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("annosync={}", config.level.as_str())));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if config.timestamps {
        let _ = subscriber.try_init();
    } else {
        let _ = subscriber.without_time().try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://localhost:8080/api/");
        assert_eq!(config.transfer.status_check_period, 5);
        assert_eq!(config.transfer.chunk_size, 100 * 1024 * 1024);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [api]
            base_url = "https://annotate.example.com/api/"

            [transfer]
            status_check_period = 2
            progress_bars = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api.base_url, "https://annotate.example.com/api/");
        assert_eq!(config.transfer.status_check_period, 2);
        assert!(!config.transfer.progress_bars);
        // Unspecified sections and fields keep their defaults
        assert_eq!(config.api.request_timeout, 30);
        assert_eq!(config.transfer.chunk_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_poll_period() {
        let mut config = Config::default();
        config.transfer.status_check_period = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.status_check_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/definitely/not/a/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }
}

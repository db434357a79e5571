use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable holding the provider API key
pub const API_KEY_ENV: &str = "API_KEY";
/// Environment variable overriding the provider base URL
pub const BASE_URL_ENV: &str = "BASE_URL";
/// Environment variable overriding the storage directory
pub const DATA_DIR_ENV: &str = "WEATHERVANE_DATA_DIR";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Summarize all errors on one line
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Per-city retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Task executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Result store and region archive locations
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Current-conditions endpoint of the weather provider
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Provider access key. Usually supplied via `API_KEY` rather than the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://api.weatherstack.com/current".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured key, treating blank values as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total fetch attempts per city, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> u64 {
    60
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum number of cities fetched at once within one task
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Finished tasks whose status the queue keeps in memory. Older ones are
    /// answered from the result store.
    #[serde(default = "default_retained_tasks")]
    pub retained_tasks: usize,
}

fn default_concurrency() -> usize {
    8
}

fn default_retained_tasks() -> usize {
    1024
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            retained_tasks: default_retained_tasks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for the result database and the region archive
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weathervane")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// SQLite file backing the result store
    pub fn results_db_path(&self) -> PathBuf {
        self.data_dir.join("results.db")
    }

    /// Directory holding one sub-directory per region
    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("weather_data")
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating it if it doesn't exist,
    /// then apply environment overrides.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents =
                std::fs::read_to_string(config_path).context("Failed to read config file")?;
            toml::from_str(&contents).map_err(|e| ConfigError::Malformed {
                path: config_path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails; a missing API key is such a failure.
    pub fn load_validated(config_path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Overlay `API_KEY`, `BASE_URL` and `WEATHERVANE_DATA_DIR` when set
    pub fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env(API_KEY_ENV) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = non_empty_env(BASE_URL_ENV) {
            self.provider.base_url = url;
        }
        if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.provider.base_url, "provider.base_url", &mut result);

        if self.provider.api_key().is_none() {
            result.add_error(
                "provider.api_key",
                format!("No API key available (set {})", API_KEY_ENV),
            );
        }

        if self.provider.timeout_secs == 0 {
            result.add_error("provider.timeout_secs", "Timeout must be greater than 0");
        }

        if self.retry.max_attempts == 0 {
            result.add_error("retry.max_attempts", "At least one attempt is required");
        } else if self.retry.max_attempts > 10 {
            result.add_warning("retry.max_attempts", "More than 10 attempts per city");
        }

        if self.retry.delay_secs > 3600 {
            result.add_warning("retry.delay_secs", "Retry delay is more than an hour");
        }

        if self.executor.concurrency == 0 {
            result.add_error("executor.concurrency", "Concurrency must be greater than 0");
        }

        if self.executor.retained_tasks == 0 {
            result.add_error(
                "executor.retained_tasks",
                "At least one finished task must be retained",
            );
        }

        if self.storage.data_dir.exists() && !self.storage.data_dir.is_dir() {
            result.add_error(
                "storage.data_dir",
                format!(
                    "Path is not a directory: {}",
                    self.storage.data_dir.display()
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the given path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weathervane");

        Ok(config_dir.join("config.toml"))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.provider.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn test_default_config_requires_api_key() {
        let result = Config::default().validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "provider.api_key"));
    }

    #[test]
    fn test_configured_default_is_valid() {
        let result = configured().validate();
        assert!(result.is_valid(), "Config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let mut config = configured();
        config.provider.api_key = Some("   ".to_string());
        assert!(config.provider.api_key().is_none());
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = configured();
        config.provider.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = configured();
        config.retry.max_attempts = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "retry.max_attempts"));
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [provider]
            base_url = "https://example.com/current"

            [retry]
            delay_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_secs, 5);
        assert_eq!(config.executor.concurrency, 8);
        assert_eq!(config.executor.retained_tasks, 1024);
    }

    #[test]
    fn test_provider_section_with_only_api_key() {
        let config: Config = toml::from_str(
            r#"
            [provider]
            api_key = "k"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.base_url, ProviderConfig::default().base_url);
        assert_eq!(config.provider.api_key(), Some("k"));
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_zero_retained_tasks_rejected() {
        let mut config = configured();
        config.executor.retained_tasks = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "executor.retained_tasks"));
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[provider\nbase_url = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/var/lib/weathervane"),
        };
        assert_eq!(
            storage.results_db_path(),
            PathBuf::from("/var/lib/weathervane/results.db")
        );
        assert_eq!(
            storage.archive_dir(),
            PathBuf::from("/var/lib/weathervane/weather_data")
        );
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}

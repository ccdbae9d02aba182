//! Configuration management for the feed client
//!
//! This module provides a layered configuration system that loads
//! settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use feedlab::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Feed endpoint: {}", config.endpoint.host);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the
//! pattern `FEEDLAB__<section>__<key>`:
//!
//! - `FEEDLAB__ENDPOINT__HOST=https://feed.staging.feedlab.com`
//! - `FEEDLAB__HTTP__REQUEST_TIMEOUT_SECS=60`
//! - `FEEDLAB__DOWNLOAD__CONCURRENCY=8`
//!
//! The API token is not part of the file-based configuration; pass it
//! to the client constructors, or export `FEEDLAB_TOKEN` and use
//! [`token_from_env`].
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/feedlab.toml`.
//! This can be overridden using the `FEEDLAB_CONFIG` environment
//! variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, DownloadConfig, EndpointConfig, HttpConfig, QueryConfig};
pub use sources::token_from_env;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails (bad host URL, zero limits).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// A validated default configuration pointed at a different host.
    ///
    /// Convenient for tests and for callers that talk to a staging
    /// deployment of the feed service.
    pub fn with_host(host: impl Into<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.endpoint.host = host.into();
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[endpoint]
host = "http://127.0.0.1:8080"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.endpoint.host, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validation_catches_bad_host() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[endpoint]
host = "feed.feedlab.com/"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::InvalidHostScheme { .. })
        ));
    }

    #[test]
    fn test_with_host() {
        let config = Config::with_host("http://localhost:9999").unwrap();
        assert_eq!(config.endpoint.host, "http://localhost:9999");

        assert!(Config::with_host("localhost:9999").is_err());
    }
}

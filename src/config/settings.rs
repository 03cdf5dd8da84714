//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub stats: StatsConfig,
    pub admission: AdmissionConfig,
    pub logging: LoggingConfig,
}

/// Which storage backend holds events and requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Stats server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    pub enabled: bool,
    pub base_url: String,
    pub app_name: String,
    pub timeout_seconds: u64,
}

/// Admission maintenance configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    /// Period of the confirmed-count reconciliation sweep; 0 disables it
    pub reconcile_interval_seconds: u64,
    /// Events reconciled concurrently during a sweep
    pub reconcile_concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables.
    ///
    /// Values missing from both sources fall back to [`Settings::default`].
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::from_file("config")
    }

    /// Load settings from a specific file (extension optional) plus environment
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("EVENTDESK").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::EventDeskError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: "postgresql://localhost/eventdesk".to_string(),
                max_connections: 10,
                min_connections: 1,
                run_migrations: true,
            },
            redis: None,
            stats: StatsConfig {
                enabled: true,
                base_url: "http://localhost:9090".to_string(),
                app_name: "ewm-main-service".to_string(),
                timeout_seconds: 5,
            },
            admission: AdmissionConfig {
                reconcile_interval_seconds: 300,
                reconcile_concurrency: 4,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: "logs".to_string(),
                file_prefix: "eventdesk.log".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.database.backend, StorageBackend::Postgres);
        assert!(settings.redis.is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let settings = Settings::from_file("does-not-exist/eventdesk").unwrap();
        assert_eq!(settings.stats.app_name, "ewm-main-service");
        assert_eq!(settings.admission.reconcile_concurrency, 4);
    }
}

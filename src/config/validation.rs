//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{EventDeskError, Result};
use super::{Settings, StorageBackend};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_stats_config(&settings.stats)?;
    validate_admission_config(&settings.admission)?;
    validate_logging_config(&settings.logging)?;

    if let Some(ref redis_config) = settings.redis {
        validate_redis_config(redis_config)?;
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.backend == StorageBackend::Memory {
        return Ok(());
    }

    if config.url.is_empty() {
        return Err(EventDeskError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(EventDeskError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(EventDeskError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(EventDeskError::Config(
            "Redis URL is required".to_string()
        ));
    }

    if config.ttl_seconds == 0 {
        return Err(EventDeskError::Config(
            "Redis TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate stats server configuration
fn validate_stats_config(config: &super::StatsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    url::Url::parse(&config.base_url)
        .map_err(|e| EventDeskError::Config(format!("Invalid stats base URL '{}': {}", config.base_url, e)))?;

    if config.app_name.is_empty() {
        return Err(EventDeskError::Config(
            "Stats app name is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(EventDeskError::Config(
            "Stats timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate admission maintenance configuration
fn validate_admission_config(config: &super::AdmissionConfig) -> Result<()> {
    if config.reconcile_concurrency == 0 {
        return Err(EventDeskError::Config(
            "Reconcile concurrency must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(EventDeskError::Config(
            "Log level is required".to_string()
        ));
    }

    if config.directory.is_empty() || config.file_prefix.is_empty() {
        return Err(EventDeskError::Config(
            "Log directory and file prefix are required".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    #[test]
    fn test_memory_backend_skips_database_checks() {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Memory;
        settings.database.url.clear();
        assert!(validate_settings(&settings).is_ok());

        settings.database.backend = StorageBackend::Postgres;
        assert!(matches!(validate_settings(&settings), Err(EventDeskError::Config(_))));
    }

    #[test]
    fn test_invalid_stats_url_rejected() {
        let mut settings = Settings::default();
        settings.stats.base_url = "not a url".to_string();
        assert!(validate_settings(&settings).is_err());

        settings.stats.enabled = false;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_redis_section_validated_when_present() {
        let mut settings = Settings::default();
        settings.redis = Some(RedisConfig {
            url: "redis://localhost:6379".to_string(),
            prefix: "eventdesk:".to_string(),
            ttl_seconds: 0,
        });
        assert!(validate_settings(&settings).is_err());
    }
}

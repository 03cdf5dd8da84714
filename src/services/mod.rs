//! Services module
//!
//! This module contains the business logic services

pub mod admission;
pub mod locks;
pub mod publication;
pub mod redis;
pub mod stats;

// Re-export commonly used services
pub use admission::{AdmissionService, ReconcileReport};
pub use locks::{EventGuard, EventLocks};
pub use publication::PublicationService;
pub use redis::RedisService;
pub use stats::{DisabledStatsClient, EndpointHit, HitInfo, HttpStatsClient, StatsClient, StatsService, ViewStats};

use crate::config::settings::Settings;
use crate::database::DatabaseService;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Debug, Clone)]
pub struct ServiceFactory {
    pub database: DatabaseService,
    pub admission: AdmissionService,
    pub publication: PublicationService,
    pub stats: StatsService,
    pub redis_service: Option<RedisService>,
}

impl ServiceFactory {
    /// Wire every service from settings over an existing database service
    pub fn new(settings: &Settings, database: DatabaseService) -> Result<Self> {
        let redis_service = settings.redis.as_ref().map(RedisService::new).transpose()?;
        let mut stats = StatsService::from_config(&settings.stats)?;
        if let Some(ref redis) = redis_service {
            stats = stats.with_cache(redis.clone());
        }
        Ok(Self::with_stats(database, stats, redis_service))
    }

    /// Wire services around a caller-provided stats service
    pub fn with_stats(database: DatabaseService, stats: StatsService, redis_service: Option<RedisService>) -> Self {
        // one registry shared by every service that mutates events
        let locks = EventLocks::new();
        Self {
            admission: AdmissionService::new(database.clone(), locks.clone()),
            publication: PublicationService::new(database.clone(), locks, stats.clone()),
            database,
            stats,
            redis_service,
        }
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let database_healthy = self.database.health_check().await.is_ok();
        let redis_healthy = match self.redis_service {
            Some(ref redis) => Some(redis.health_check().await.unwrap_or(false)),
            None => None,
        };
        let stats_reachable = self.stats.health_check().await;

        ServiceHealthStatus {
            database_healthy,
            redis_healthy,
            stats_reachable,
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    /// `None` when no cache is configured
    pub redis_healthy: Option<bool>,
    pub stats_reachable: bool,
}

impl ServiceHealthStatus {
    /// Only the database is critical; the cache and stats server degrade to defaults
    pub fn is_healthy(&self) -> bool {
        self.database_healthy
    }

    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if self.redis_healthy == Some(false) {
            issues.push("Redis connection failed".to_string());
        }
        if !self.stats_reachable {
            issues.push("Stats server unreachable, views default to 0".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;

    #[tokio::test]
    async fn test_memory_factory_is_healthy() {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Memory;
        settings.stats.enabled = false;

        let database = DatabaseService::connect(&settings.database).await.unwrap();
        let services = ServiceFactory::new(&settings, database).unwrap();
        let health = services.health_check().await;

        assert!(health.is_healthy());
        assert_eq!(health.redis_healthy, None);
        assert!(health.get_issues().is_empty());
    }
}

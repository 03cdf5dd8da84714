//! Database service layer
//!
//! Bundles the three storage seams behind trait objects so the services do
//! not care which backend is configured.

use std::sync::Arc;
use crate::config::{DatabaseConfig, StorageBackend};
use crate::database::connection::{create_pool, run_migrations, DatabasePool, PoolConfig};
use crate::database::memory::MemoryStore;
use crate::database::repositories::{EventRepository, PgCapacityTracker, RequestRepository};
use crate::database::store::{CapacityTracker, EventStore, RequestStore};
use crate::utils::errors::Result;

#[derive(Clone)]
pub struct DatabaseService {
    pub events: Arc<dyn EventStore>,
    pub requests: Arc<dyn RequestStore>,
    pub capacity: Arc<dyn CapacityTracker>,
    pool: Option<DatabasePool>,
}

impl DatabaseService {
    /// PostgreSQL-backed stores sharing one pool
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            events: Arc::new(EventRepository::new(pool.clone())),
            requests: Arc::new(RequestRepository::new(pool.clone())),
            capacity: Arc::new(PgCapacityTracker::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// All three seams served by one [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            events: store.clone(),
            requests: store.clone(),
            capacity: store,
            pool: None,
        }
    }

    /// Build the backend selected in configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on shutdown");
                Ok(Self::in_memory())
            }
            StorageBackend::Postgres => {
                let pool = create_pool(&PoolConfig::from(config)).await?;
                if config.run_migrations {
                    run_migrations(&pool).await?;
                }
                Ok(Self::new(pool))
            }
        }
    }

    /// Ping the pool; the memory backend is always healthy
    pub async fn health_check(&self) -> Result<()> {
        match self.pool {
            Some(ref pool) => crate::database::connection::health_check(pool).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("backend", &if self.pool.is_some() { "postgres" } else { "memory" })
            .finish()
    }
}

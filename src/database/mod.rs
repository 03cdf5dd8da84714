//! Database module
//!
//! This module handles database connections and the storage backends

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod service;
pub mod store;

// Re-export commonly used database components
pub use connection::{DatabasePool, PoolConfig, create_pool, run_migrations, health_check};
pub use memory::MemoryStore;
pub use repositories::{EventRepository, PgCapacityTracker, RequestRepository};
pub use service::DatabaseService;
pub use store::{
    Availability, BatchDecision, CapacityTracker, EventStore, Reconciliation, RequestStore, ReserveMode, Settlement,
};

//! Database repositories module
//!
//! This module contains the PostgreSQL implementations of the storage traits

pub mod capacity;
pub mod event;
pub mod request;

// Re-export repositories
pub use capacity::PgCapacityTracker;
pub use event::EventRepository;
pub use request::RequestRepository;

//! EventDesk
//!
//! Event listing backend: owners propose events, admins publish them and
//! users request to participate. Participation requests are admitted under
//! each event's participant limit without overbooking, whether they arrive
//! one at a time or as owner batches.

#![allow(non_snake_case)]

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{ConflictReason, ErrorKind, EventDeskError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use services::{AdmissionService, PublicationService, ServiceFactory, StatsService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}

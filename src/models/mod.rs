//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod event;
pub mod request;

// Re-export commonly used models
pub use event::{
    AdminEventUpdate, AdminStateAction, CreateEventRequest, Event, EventChanges, EventState, EventView, Location,
    OwnerEventUpdate, OwnerStateAction,
};
pub use request::{ParticipationRequest, RequestStatus, StatusDecision, StatusUpdateCommand, StatusUpdateResult};

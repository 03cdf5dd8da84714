//! Error handling for EventDesk
//!
//! This module defines the main error types used throughout the application
//! and provides a unified error handling strategy.
//!
//! Business outcomes (`NotFound`, `Conflict`, `BadRequest`) are kept apart from
//! infrastructure failures, which always classify as [`ErrorKind::Internal`].

use thiserror::Error;

/// Main error type for EventDesk application
#[derive(Error, Debug)]
pub enum EventDeskError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("{entity} with id={id} was not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictReason),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Business rule violations surfaced as conflicts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    #[error("event initiator cannot request participation in their own event")]
    OwnEvent,

    #[error("participation request already submitted")]
    DuplicateRequest,

    #[error("event is not published")]
    EventNotPublished,

    #[error("participant limit of the event has been reached")]
    ParticipantLimitReached,

    #[error("request {request_id} is not pending")]
    RequestNotPending { request_id: i64 },

    #[error("user {user_id} does not own event {event_id}")]
    NotEventOwner { user_id: i64, event_id: i64 },

    #[error("user can only cancel their own requests")]
    NotRequester,

    #[error("only pending or canceled events can be changed")]
    EventPublished,

    #[error("event can be published or rejected only while pending, current state is {state}")]
    NotAwaitingPublication { state: String },

    #[error("event date must be at least {hours} hour(s) after {anchor}")]
    EventDateTooSoon { hours: i64, anchor: &'static str },

    #[error("participant limit {limit} is below the {confirmed} confirmed requests")]
    LimitBelowConfirmed { limit: i32, confirmed: i32 },
}

/// Coarse classification used by transports to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

/// Result type alias for EventDesk operations
pub type Result<T> = std::result::Result<T, EventDeskError>;

impl EventDeskError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        EventDeskError::NotFound { entity, id }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        EventDeskError::BadRequest(message.into())
    }

    /// Classify the error into one of the business kinds or internal
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventDeskError::NotFound { .. } => ErrorKind::NotFound,
            EventDeskError::Conflict(_) => ErrorKind::Conflict,
            EventDeskError::BadRequest(_) => ErrorKind::BadRequest,
            _ => ErrorKind::Internal,
        }
    }

    /// HTTP-equivalent status code
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::BadRequest => 400,
            ErrorKind::Internal => 500,
        }
    }

    /// Conflict reason, if this is a business conflict
    pub fn conflict_reason(&self) -> Option<&ConflictReason> {
        match self {
            EventDeskError::Conflict(reason) => Some(reason),
            _ => None,
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            EventDeskError::Database(_) => false,
            EventDeskError::Migration(_) => false,
            EventDeskError::Redis(_) => true,
            EventDeskError::Http(_) => true,
            EventDeskError::Serialization(_) => false,
            EventDeskError::Io(_) => true,
            EventDeskError::UrlParse(_) => false,
            EventDeskError::Config(_) => false,
            EventDeskError::Storage(_) => false,
            EventDeskError::ServiceUnavailable(_) => true,
            EventDeskError::NotFound { .. } => false,
            EventDeskError::Conflict(_) => false,
            EventDeskError::BadRequest(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EventDeskError::Database(_) => ErrorSeverity::Critical,
            EventDeskError::Migration(_) => ErrorSeverity::Critical,
            EventDeskError::Config(_) => ErrorSeverity::Critical,
            EventDeskError::Storage(_) => ErrorSeverity::Critical,
            EventDeskError::NotFound { .. } => ErrorSeverity::Info,
            EventDeskError::BadRequest(_) => ErrorSeverity::Info,
            EventDeskError::Conflict(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Map a unique-constraint violation onto a business conflict, keeping
    /// every other database failure internal
    pub(crate) fn from_insert(error: sqlx::Error, on_unique: ConflictReason) -> Self {
        if let sqlx::Error::Database(ref db_error) = error {
            if db_error.is_unique_violation() {
                return EventDeskError::Conflict(on_unique);
            }
        }
        EventDeskError::Database(error)
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_kinds_map_to_status_codes() {
        assert_eq!(EventDeskError::not_found("Event", 1).status_code(), 404);
        assert_eq!(EventDeskError::Conflict(ConflictReason::DuplicateRequest).status_code(), 409);
        assert_eq!(EventDeskError::bad_request("size must be positive").status_code(), 400);
    }

    #[test]
    fn test_infrastructure_errors_are_internal() {
        let error = EventDeskError::Storage("lock poisoned".to_string());
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert!(error.conflict_reason().is_none());

        let error = EventDeskError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.kind(), ErrorKind::Internal);
        assert_eq!(error.status_code(), 500);
    }

    #[test]
    fn test_conflict_message_names_the_rule() {
        let error: EventDeskError = ConflictReason::RequestNotPending { request_id: 7 }.into();
        assert_eq!(error.to_string(), "Conflict: request 7 is not pending");
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_non_unique_insert_failure_stays_internal() {
        let error = EventDeskError::from_insert(sqlx::Error::PoolTimedOut, ConflictReason::DuplicateRequest);
        assert_eq!(error.kind(), ErrorKind::Internal);
    }
}

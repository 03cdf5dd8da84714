//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use chrono::{DateTime, NaiveDateTime, Utc};
use crate::utils::errors::{EventDeskError, Result};

/// Timestamp layout understood by the stats server
pub const STATS_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way the stats server expects it
pub fn format_stats_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(STATS_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stats server timestamp (interpreted as UTC)
pub fn parse_stats_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, STATS_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| EventDeskError::bad_request(format!("invalid timestamp '{}': {}", value, e)))
}

/// Public URI of an event, used as the stats key
pub fn event_uri(event_id: i64) -> String {
    format!("/events/{}", event_id)
}

/// Check that `value` has between `bounds.0` and `bounds.1` characters
pub fn validate_length(field: &str, value: &str, bounds: (usize, usize)) -> Result<()> {
    let (min, max) = bounds;
    let length = value.trim().chars().count();
    if length < min || length > max {
        return Err(EventDeskError::bad_request(format!(
            "{} must be between {} and {} characters, got {}",
            field, min, max, length
        )));
    }
    Ok(())
}

/// Convert `from`/`size` paging parameters into a limit and offset
pub fn page_bounds(from: i64, size: i64) -> Result<(i64, i64)> {
    if from < 0 {
        return Err(EventDeskError::bad_request("from must not be negative"));
    }
    if size <= 0 {
        return Err(EventDeskError::bad_request("size must be positive"));
    }
    // offset snaps down to a page boundary
    let offset = (from / size) * size;
    Ok((size, offset))
}

/// Reject an inverted time range
pub fn check_time_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(EventDeskError::bad_request("range start must be before range end"));
        }
    }
    Ok(())
}

//! Builders for test inputs

use chrono::{Duration, Utc};
use EventDesk::models::{CreateEventRequest, Location, StatusDecision, StatusUpdateCommand};

pub const OWNER_ID: i64 = 1;
pub const FIRST_REQUESTER: i64 = 100;

/// A valid draft one week ahead
pub fn event_draft(participant_limit: i32, request_moderation: bool) -> CreateEventRequest {
    CreateEventRequest {
        title: "Friday lindy social".to_string(),
        annotation: "Social dancing with a DJ and a taster class".to_string(),
        description: "Taster class at eight, then social dancing until midnight".to_string(),
        category_id: Some(1),
        event_date: Utc::now() + Duration::days(7),
        location: Some(Location { lat: 59.93, lon: 30.31 }),
        paid: false,
        participant_limit,
        request_moderation,
    }
}

pub fn confirm(request_ids: &[i64]) -> StatusUpdateCommand {
    StatusUpdateCommand {
        request_ids: request_ids.to_vec(),
        status: StatusDecision::Confirmed,
    }
}

pub fn reject(request_ids: &[i64]) -> StatusUpdateCommand {
    StatusUpdateCommand {
        request_ids: request_ids.to_vec(),
        status: StatusDecision::Rejected,
    }
}

/// Requester ids that never collide with the owner
pub fn requesters(count: usize) -> Vec<i64> {
    (0..count as i64).map(|i| FIRST_REQUESTER + i).collect()
}

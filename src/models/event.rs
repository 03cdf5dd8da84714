//! Event model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::validate_length;

pub const TITLE_LENGTH: (usize, usize) = (3, 120);
pub const ANNOTATION_LENGTH: (usize, usize) = (20, 2000);
pub const DESCRIPTION_LENGTH: (usize, usize) = (20, 7000);

/// Publication state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_state", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    Pending,
    Published,
    Canceled,
}

impl EventState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Pending => "PENDING",
            EventState::Published => "PUBLISHED",
            EventState::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for EventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f32,
    pub lon: f32,
}

/// Event row.
///
/// `confirmed_requests` is a cached count of CONFIRMED requests. It is only
/// ever changed through a [`CapacityTracker`](crate::database::CapacityTracker);
/// store updates leave it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub annotation: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub location_lat: Option<f32>,
    pub location_lon: Option<f32>,
    pub paid: bool,
    pub participant_limit: i32,
    pub request_moderation: bool,
    pub confirmed_requests: i32,
    pub state: EventState,
    pub event_date: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub published_on: Option<DateTime<Utc>>,
}

impl Event {
    pub fn location(&self) -> Option<Location> {
        match (self.location_lat, self.location_lon) {
            (Some(lat), Some(lon)) => Some(Location { lat, lon }),
            _ => None,
        }
    }

    /// Requests are confirmed on arrival when there is no limit or no moderation
    pub fn admits_automatically(&self) -> bool {
        self.participant_limit == 0 || !self.request_moderation
    }

    pub fn is_published(&self) -> bool {
        self.state == EventState::Published
    }

    pub fn is_saturated(&self) -> bool {
        self.participant_limit > 0 && self.confirmed_requests >= self.participant_limit
    }
}

/// Draft submitted by an owner to propose an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    pub annotation: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub event_date: DateTime<Utc>,
    pub location: Option<Location>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub participant_limit: i32,
    #[serde(default = "default_request_moderation")]
    pub request_moderation: bool,
}

fn default_request_moderation() -> bool {
    true
}

impl CreateEventRequest {
    pub fn validate(&self) -> Result<()> {
        validate_length("title", &self.title, TITLE_LENGTH)?;
        validate_length("annotation", &self.annotation, ANNOTATION_LENGTH)?;
        validate_length("description", &self.description, DESCRIPTION_LENGTH)?;
        validate_participant_limit(self.participant_limit)
    }
}

/// Field changes shared by owner and admin edits; `None` keeps the current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventChanges {
    pub title: Option<String>,
    pub annotation: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub event_date: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub paid: Option<bool>,
    pub participant_limit: Option<i32>,
    pub request_moderation: Option<bool>,
}

impl EventChanges {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref title) = self.title {
            validate_length("title", title, TITLE_LENGTH)?;
        }
        if let Some(ref annotation) = self.annotation {
            validate_length("annotation", annotation, ANNOTATION_LENGTH)?;
        }
        if let Some(ref description) = self.description {
            validate_length("description", description, DESCRIPTION_LENGTH)?;
        }
        if let Some(limit) = self.participant_limit {
            validate_participant_limit(limit)?;
        }
        Ok(())
    }

    /// Copy every present field onto `event`
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(ref title) = self.title {
            event.title = title.clone();
        }
        if let Some(ref annotation) = self.annotation {
            event.annotation = annotation.clone();
        }
        if let Some(ref description) = self.description {
            event.description = description.clone();
        }
        if let Some(category_id) = self.category_id {
            event.category_id = Some(category_id);
        }
        if let Some(event_date) = self.event_date {
            event.event_date = event_date;
        }
        if let Some(location) = self.location {
            event.location_lat = Some(location.lat);
            event.location_lon = Some(location.lon);
        }
        if let Some(paid) = self.paid {
            event.paid = paid;
        }
        if let Some(limit) = self.participant_limit {
            event.participant_limit = limit;
        }
        if let Some(moderation) = self.request_moderation {
            event.request_moderation = moderation;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerStateAction {
    SendToReview,
    CancelReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminStateAction {
    PublishEvent,
    RejectEvent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerEventUpdate {
    #[serde(flatten)]
    pub changes: EventChanges,
    pub state_action: Option<OwnerStateAction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEventUpdate {
    #[serde(flatten)]
    pub changes: EventChanges,
    pub state_action: Option<AdminStateAction>,
}

/// Published event together with its view total
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub views: i64,
}

fn validate_participant_limit(limit: i32) -> Result<()> {
    if limit < 0 {
        return Err(EventDeskError::bad_request(format!(
            "participantLimit must be zero or positive, got {}",
            limit
        )));
    }
    Ok(())
}

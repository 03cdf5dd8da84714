//! Participation request model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Confirmed,
    Rejected,
    Canceled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Confirmed => "CONFIRMED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ParticipationRequest {
    pub id: i64,
    #[serde(rename = "event")]
    pub event_id: i64,
    #[serde(rename = "requester")]
    pub requester_id: i64,
    pub status: RequestStatus,
    pub created: DateTime<Utc>,
}

/// Outcome an owner may ask for in a batch status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusDecision {
    Confirmed,
    Rejected,
}

impl From<StatusDecision> for RequestStatus {
    fn from(decision: StatusDecision) -> Self {
        match decision {
            StatusDecision::Confirmed => RequestStatus::Confirmed,
            StatusDecision::Rejected => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateCommand {
    pub request_ids: Vec<i64>,
    pub status: StatusDecision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResult {
    pub confirmed_requests: Vec<ParticipationRequest>,
    pub rejected_requests: Vec<ParticipationRequest>,
}

impl StatusUpdateResult {
    pub fn confirmed_ids(&self) -> Vec<i64> {
        self.confirmed_requests.iter().map(|r| r.id).collect()
    }

    pub fn rejected_ids(&self) -> Vec<i64> {
        self.rejected_requests.iter().map(|r| r.id).collect()
    }
}

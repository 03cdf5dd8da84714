//! Storage traits consumed by the services
//!
//! Every backend (PostgreSQL, in-memory) implements the same three seams.
//! The confirmed-request counter of an event is reachable only through
//! [`CapacityTracker`], whose operations change the counter and the request
//! rows together in one atomic step.

use async_trait::async_trait;
use crate::models::{CreateEventRequest, Event, ParticipationRequest, RequestStatus};
use crate::utils::errors::Result;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new PENDING event with no confirmed requests
    async fn create(&self, owner_id: i64, request: &CreateEventRequest) -> Result<Event>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Event>>;

    /// Persist every mutable column of `event` except `confirmed_requests`
    async fn update(&self, event: &Event) -> Result<Event>;

    /// Events created by `owner_id`, newest event date first
    async fn list_by_owner(&self, owner_id: i64, limit: i64, offset: i64) -> Result<Vec<Event>>;

    /// Ids of published events with a participant limit
    async fn list_published_limited_ids(&self) -> Result<Vec<i64>>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a request; a second request for the same requester and event
    /// fails with `Conflict(DuplicateRequest)`
    async fn create(&self, event_id: i64, requester_id: i64, status: RequestStatus) -> Result<ParticipationRequest>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ParticipationRequest>>;

    async fn exists_for(&self, requester_id: i64, event_id: i64) -> Result<bool>;

    async fn list_by_event(&self, event_id: i64) -> Result<Vec<ParticipationRequest>>;

    async fn list_by_requester(&self, requester_id: i64) -> Result<Vec<ParticipationRequest>>;

    async fn count_by_status(&self, event_id: i64, status: RequestStatus) -> Result<i64>;
}

/// How a reservation treats the participant limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveMode {
    /// Grant at most the remaining slots
    WithinLimit,
    /// Grant everything requested
    Unbounded,
}

impl ReserveMode {
    /// Slots granted out of `requested` for an event with `limit` and `confirmed`
    pub fn grant(self, limit: i32, confirmed: i32, requested: u32) -> u32 {
        if self == ReserveMode::Unbounded || limit == 0 {
            requested
        } else {
            requested.min((limit - confirmed).max(0) as u32)
        }
    }
}

/// What a batch does with the requests it settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    Reject,
    /// Confirm in the order given while slots last, reject the rest
    Confirm(ReserveMode),
}

impl BatchDecision {
    /// Pair each id with its new status once `granted` slots are known
    pub fn assign(ids: &[i64], granted: u32) -> Vec<(i64, RequestStatus)> {
        ids.iter()
            .enumerate()
            .map(|(position, id)| {
                let status = if position < granted as usize {
                    RequestStatus::Confirmed
                } else {
                    RequestStatus::Rejected
                };
                (*id, status)
            })
            .collect()
    }
}

/// Outcome of settling a batch; only `Applied` wrote anything
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Updated requests in the order they were listed
    Applied(Vec<ParticipationRequest>),
    Saturated,
    /// First listed request that is not a PENDING request of the event
    NotPending(i64),
}

/// Remaining capacity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unlimited,
    Slots(u32),
}

impl Availability {
    pub fn of(limit: i32, confirmed: i32) -> Self {
        if limit == 0 {
            Availability::Unlimited
        } else {
            Availability::Slots((limit - confirmed).max(0) as u32)
        }
    }

    pub fn is_saturated(&self) -> bool {
        matches!(self, Availability::Slots(0))
    }
}

/// Counter values around a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub event_id: i64,
    pub cached: i32,
    pub actual: i32,
}

impl Reconciliation {
    pub fn drifted(&self) -> bool {
        self.cached != self.actual
    }
}

#[async_trait]
pub trait CapacityTracker: Send + Sync {
    /// Atomically reserve up to `requested` slots, returning how many were granted
    async fn try_reserve(&self, event_id: i64, requested: u32, mode: ReserveMode) -> Result<u32>;

    /// Give back `count` slots; the counter never drops below zero
    async fn release(&self, event_id: i64, count: u32) -> Result<()>;

    /// Insert a CONFIRMED request and take its slot in one atomic step.
    ///
    /// Returns `None`, writing nothing, when `mode` grants no slot.
    async fn admit(&self, event_id: i64, requester_id: i64, mode: ReserveMode) -> Result<Option<ParticipationRequest>>;

    /// Move PENDING requests of one event to CONFIRMED or REJECTED,
    /// reserving a slot for each confirmed one, all or nothing
    async fn settle(&self, event_id: i64, request_ids: &[i64], decision: BatchDecision) -> Result<Settlement>;

    /// Set a request to CANCELED whatever its status, returning the prior
    /// status; a CONFIRMED request releases its slot in the same step
    async fn cancel(&self, request_id: i64) -> Result<Option<(RequestStatus, ParticipationRequest)>>;

    async fn availability(&self, event_id: i64) -> Result<Availability>;

    /// Overwrite the cached counter with the number of CONFIRMED requests
    async fn reconcile(&self, event_id: i64) -> Result<Reconciliation>;
}

//! In-process storage backend
//!
//! Keeps events and requests in ordered maps behind one async mutex. Every
//! trait method runs entirely under that mutex, which gives it the same
//! atomicity as the row-locking PostgreSQL transactions.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use crate::database::store::{
    Availability, BatchDecision, CapacityTracker, EventStore, Reconciliation, RequestStore, ReserveMode, Settlement,
};
use crate::models::{CreateEventRequest, Event, EventState, ParticipationRequest, RequestStatus};
use crate::utils::errors::{ConflictReason, EventDeskError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    events: BTreeMap<i64, Event>,
    requests: BTreeMap<i64, ParticipationRequest>,
    next_event_id: i64,
    next_request_id: i64,
}

impl MemoryState {
    fn event_mut(&mut self, event_id: i64) -> Result<&mut Event> {
        self.events
            .get_mut(&event_id)
            .ok_or_else(|| EventDeskError::not_found("Event", event_id))
    }

    fn insert_request(&mut self, event_id: i64, requester_id: i64, status: RequestStatus) -> Result<ParticipationRequest> {
        if !self.events.contains_key(&event_id) {
            return Err(EventDeskError::not_found("Event", event_id));
        }
        if self.requests.values().any(|r| r.event_id == event_id && r.requester_id == requester_id) {
            return Err(ConflictReason::DuplicateRequest.into());
        }
        self.next_request_id += 1;
        let request = ParticipationRequest {
            id: self.next_request_id,
            event_id,
            requester_id,
            status,
            created: Utc::now(),
        };
        self.requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn reserve(&mut self, event_id: i64, requested: u32, mode: ReserveMode) -> Result<u32> {
        let event = self.event_mut(event_id)?;
        let granted = mode.grant(event.participant_limit, event.confirmed_requests, requested);
        event.confirmed_requests += granted as i32;
        Ok(granted)
    }

    fn release(&mut self, event_id: i64, count: u32) -> Result<()> {
        let event = self.event_mut(event_id)?;
        event.confirmed_requests = (event.confirmed_requests - count as i32).max(0);
        Ok(())
    }

    fn confirmed_count(&self, event_id: i64) -> usize {
        self.requests
            .values()
            .filter(|r| r.event_id == event_id && r.status == RequestStatus::Confirmed)
            .count()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create(&self, owner_id: i64, request: &CreateEventRequest) -> Result<Event> {
        let mut state = self.state.lock().await;
        state.next_event_id += 1;
        let event = Event {
            id: state.next_event_id,
            owner_id,
            title: request.title.clone(),
            annotation: request.annotation.clone(),
            description: request.description.clone(),
            category_id: request.category_id,
            location_lat: request.location.map(|l| l.lat),
            location_lon: request.location.map(|l| l.lon),
            paid: request.paid,
            participant_limit: request.participant_limit,
            request_moderation: request.request_moderation,
            confirmed_requests: 0,
            state: EventState::Pending,
            event_date: request.event_date,
            created_on: Utc::now(),
            published_on: None,
        };
        state.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Event>> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn update(&self, event: &Event) -> Result<Event> {
        let mut state = self.state.lock().await;
        let stored = state.event_mut(event.id)?;
        let confirmed = stored.confirmed_requests;
        *stored = Event { confirmed_requests: confirmed, ..event.clone() };
        Ok(stored.clone())
    }

    async fn list_by_owner(&self, owner_id: i64, limit: i64, offset: i64) -> Result<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state.events.values().filter(|e| e.owner_id == owner_id).cloned().collect();
        events.sort_by(|a, b| b.event_date.cmp(&a.event_date).then(b.id.cmp(&a.id)));
        Ok(events
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_published_limited_ids(&self) -> Result<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .values()
            .filter(|e| e.state == EventState::Published && e.participant_limit > 0)
            .map(|e| e.id)
            .collect())
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create(&self, event_id: i64, requester_id: i64, status: RequestStatus) -> Result<ParticipationRequest> {
        self.state.lock().await.insert_request(event_id, requester_id, status)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ParticipationRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn exists_for(&self, requester_id: i64, event_id: i64) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.requests.values().any(|r| r.event_id == event_id && r.requester_id == requester_id))
    }

    async fn list_by_event(&self, event_id: i64) -> Result<Vec<ParticipationRequest>> {
        let state = self.state.lock().await;
        Ok(state.requests.values().filter(|r| r.event_id == event_id).cloned().collect())
    }

    async fn list_by_requester(&self, requester_id: i64) -> Result<Vec<ParticipationRequest>> {
        let state = self.state.lock().await;
        Ok(state.requests.values().filter(|r| r.requester_id == requester_id).cloned().collect())
    }

    async fn count_by_status(&self, event_id: i64, status: RequestStatus) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .values()
            .filter(|r| r.event_id == event_id && r.status == status)
            .count() as i64)
    }
}

#[async_trait]
impl CapacityTracker for MemoryStore {
    async fn try_reserve(&self, event_id: i64, requested: u32, mode: ReserveMode) -> Result<u32> {
        self.state.lock().await.reserve(event_id, requested, mode)
    }

    async fn release(&self, event_id: i64, count: u32) -> Result<()> {
        self.state.lock().await.release(event_id, count)
    }

    async fn admit(&self, event_id: i64, requester_id: i64, mode: ReserveMode) -> Result<Option<ParticipationRequest>> {
        let mut state = self.state.lock().await;
        // duplicates are refused before any slot is taken
        if state.requests.values().any(|r| r.event_id == event_id && r.requester_id == requester_id) {
            return Err(ConflictReason::DuplicateRequest.into());
        }
        if state.reserve(event_id, 1, mode)? == 0 {
            return Ok(None);
        }
        state.insert_request(event_id, requester_id, RequestStatus::Confirmed).map(Some)
    }

    async fn settle(&self, event_id: i64, request_ids: &[i64], decision: BatchDecision) -> Result<Settlement> {
        let mut state = self.state.lock().await;
        if state.event_mut(event_id)?.is_saturated() {
            return Ok(Settlement::Saturated);
        }

        let blocked = request_ids.iter().copied().find(|id| {
            !state
                .requests
                .get(id)
                .map(|r| r.event_id == event_id && r.status == RequestStatus::Pending)
                .unwrap_or(false)
        });
        if let Some(request_id) = blocked {
            return Ok(Settlement::NotPending(request_id));
        }

        let granted = match decision {
            BatchDecision::Reject => 0,
            BatchDecision::Confirm(mode) => state.reserve(event_id, request_ids.len() as u32, mode)?,
        };
        let mut updated = Vec::with_capacity(request_ids.len());
        for (id, status) in BatchDecision::assign(request_ids, granted) {
            if let Some(request) = state.requests.get_mut(&id) {
                request.status = status;
                updated.push(request.clone());
            }
        }
        Ok(Settlement::Applied(updated))
    }

    async fn cancel(&self, request_id: i64) -> Result<Option<(RequestStatus, ParticipationRequest)>> {
        let mut state = self.state.lock().await;
        let Some(request) = state.requests.get_mut(&request_id) else {
            return Ok(None);
        };
        let prior = request.status;
        request.status = RequestStatus::Canceled;
        let canceled = request.clone();

        if prior == RequestStatus::Confirmed {
            state.release(canceled.event_id, 1)?;
        }
        Ok(Some((prior, canceled)))
    }

    async fn availability(&self, event_id: i64) -> Result<Availability> {
        let mut state = self.state.lock().await;
        let event = state.event_mut(event_id)?;
        Ok(Availability::of(event.participant_limit, event.confirmed_requests))
    }

    async fn reconcile(&self, event_id: i64) -> Result<Reconciliation> {
        let mut state = self.state.lock().await;
        let actual = state.confirmed_count(event_id) as i32;
        let event = state.event_mut(event_id)?;
        let cached = event.confirmed_requests;
        event.confirmed_requests = actual;
        Ok(Reconciliation { event_id, cached, actual })
    }
}

//! Participation request admission
//!
//! Decides whether a request ends up CONFIRMED, PENDING or REJECTED under the
//! event's participant limit. Every mutating operation holds the event's lock
//! from [`EventLocks`] while it checks preconditions, so callers in one
//! process see preconditions in a stable order. Slots are taken and returned
//! only through [`CapacityTracker`], whose operations write the counter and
//! the request rows in one atomic step. That step alone keeps an event from
//! being overbooked when several processes share the store.
//!
//! [`CapacityTracker`]: crate::database::CapacityTracker

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use crate::database::{BatchDecision, DatabaseService, ReserveMode, Settlement};
use crate::models::{
    Event, ParticipationRequest, RequestStatus, StatusDecision, StatusUpdateCommand, StatusUpdateResult,
};
use crate::services::locks::EventLocks;
use crate::utils::errors::{ConflictReason, EventDeskError, Result};
use crate::utils::logging::{log_admission_decision, log_event_action};

/// Counts from one reconciliation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub drifted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct AdmissionService {
    db: DatabaseService,
    locks: EventLocks,
}

impl AdmissionService {
    pub fn new(db: DatabaseService, locks: EventLocks) -> Self {
        Self { db, locks }
    }

    /// Create a participation request for `requester_id`.
    ///
    /// The request is CONFIRMED at once when the event has no limit or no
    /// moderation, otherwise it waits as PENDING for the owner.
    pub async fn submit_request(&self, requester_id: i64, event_id: i64) -> Result<ParticipationRequest> {
        let _guard = self.locks.acquire(event_id).await;

        let event = self.load_event(event_id).await?;
        if event.owner_id == requester_id {
            return Err(ConflictReason::OwnEvent.into());
        }
        if self.db.requests.exists_for(requester_id, event_id).await? {
            return Err(ConflictReason::DuplicateRequest.into());
        }
        if !event.is_published() {
            return Err(ConflictReason::EventNotPublished.into());
        }
        if self.db.capacity.availability(event_id).await?.is_saturated() {
            return Err(ConflictReason::ParticipantLimitReached.into());
        }

        let request = if event.admits_automatically() {
            let mode = if event.participant_limit == 0 { ReserveMode::Unbounded } else { ReserveMode::WithinLimit };
            self.db
                .capacity
                .admit(event_id, requester_id, mode)
                .await?
                .ok_or(ConflictReason::ParticipantLimitReached)?
        } else {
            self.db.requests.create(event_id, requester_id, RequestStatus::Pending).await?
        };

        log_event_action(event_id, "request_submitted", requester_id, Some(request.status.as_str()));
        log_admission_decision(event_id, request.id, request.status);
        Ok(request)
    }

    /// Confirm or reject a batch of PENDING requests of one event.
    ///
    /// Either every listed request changes status or none does. When the
    /// event has no limit or no moderation all requests are confirmed
    /// whatever `command.status` says. Otherwise a CONFIRMED batch fills the
    /// remaining slots in the order given and rejects the overflow.
    pub async fn change_request_status(
        &self,
        owner_id: i64,
        event_id: i64,
        command: &StatusUpdateCommand,
    ) -> Result<StatusUpdateResult> {
        let ids = &command.request_ids;
        if ids.is_empty() {
            return Err(EventDeskError::bad_request("requestIds must not be empty"));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(EventDeskError::bad_request(format!("request {} is listed twice", duplicate)));
        }

        let _guard = self.locks.acquire(event_id).await;

        let event = self.load_event(event_id).await?;
        if event.owner_id != owner_id {
            return Err(ConflictReason::NotEventOwner { user_id: owner_id, event_id }.into());
        }
        if !event.is_published() {
            return Err(ConflictReason::EventNotPublished.into());
        }

        let decision = if event.admits_automatically() {
            BatchDecision::Confirm(ReserveMode::Unbounded)
        } else if command.status == StatusDecision::Rejected {
            BatchDecision::Reject
        } else {
            BatchDecision::Confirm(ReserveMode::WithinLimit)
        };

        let updated = match self.db.capacity.settle(event_id, ids, decision).await? {
            Settlement::Applied(updated) => updated,
            Settlement::Saturated => return Err(ConflictReason::ParticipantLimitReached.into()),
            Settlement::NotPending(request_id) => {
                return Err(ConflictReason::RequestNotPending { request_id }.into())
            }
        };

        let mut result = StatusUpdateResult::default();
        for request in updated {
            log_admission_decision(event_id, request.id, request.status);
            match request.status {
                RequestStatus::Confirmed => result.confirmed_requests.push(request),
                _ => result.rejected_requests.push(request),
            }
        }

        info!(
            event_id = event_id,
            owner_id = owner_id,
            confirmed = result.confirmed_requests.len(),
            rejected = result.rejected_requests.len(),
            "Request batch processed"
        );
        Ok(result)
    }

    /// Cancel the caller's own request from any status, giving back its slot
    /// if it was confirmed
    pub async fn cancel_request(&self, requester_id: i64, request_id: i64) -> Result<ParticipationRequest> {
        let request = self
            .db
            .requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| EventDeskError::not_found("ParticipationRequest", request_id))?;
        if request.requester_id != requester_id {
            return Err(ConflictReason::NotRequester.into());
        }

        let _guard = self.locks.acquire(request.event_id).await;
        let (prior, canceled) = self
            .db
            .capacity
            .cancel(request_id)
            .await?
            .ok_or_else(|| EventDeskError::not_found("ParticipationRequest", request_id))?;

        log_event_action(canceled.event_id, "request_canceled", requester_id, Some(prior.as_str()));
        Ok(canceled)
    }

    /// Requests of an event, visible to its owner only
    pub async fn list_event_requests(&self, owner_id: i64, event_id: i64) -> Result<Vec<ParticipationRequest>> {
        let event = self.load_event(event_id).await?;
        if event.owner_id != owner_id {
            return Err(EventDeskError::bad_request(format!(
                "user {} is not the initiator of event {}",
                owner_id, event_id
            )));
        }
        self.db.requests.list_by_event(event_id).await
    }

    pub async fn list_user_requests(&self, requester_id: i64) -> Result<Vec<ParticipationRequest>> {
        self.db.requests.list_by_requester(requester_id).await
    }

    /// Recount CONFIRMED requests of one event and fix the cached counter
    pub async fn reconcile_confirmed(&self, event_id: i64) -> Result<Event> {
        let _guard = self.locks.acquire(event_id).await;

        let outcome = self.db.capacity.reconcile(event_id).await?;
        if outcome.drifted() {
            warn!(
                event_id = event_id,
                cached = outcome.cached,
                actual = outcome.actual,
                "Confirmed counter drifted, corrected"
            );
        }
        self.load_event(event_id).await
    }

    /// Reconcile every published event that has a participant limit
    pub async fn reconcile_all(&self, concurrency: usize) -> Result<ReconcileReport> {
        let ids = self.db.events.list_published_limited_ids().await?;
        let drifted = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        stream::iter(ids.iter().copied())
            .for_each_concurrent(concurrency.max(1), |event_id| {
                let (drifted, failed) = (&drifted, &failed);
                async move {
                    let _guard = self.locks.acquire(event_id).await;
                    match self.db.capacity.reconcile(event_id).await {
                        Ok(outcome) if outcome.drifted() => {
                            warn!(event_id = event_id, cached = outcome.cached, actual = outcome.actual, "Confirmed counter drifted, corrected");
                            drifted.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(event_id = event_id, error = %e, "Reconciliation failed");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
            .await;

        let report = ReconcileReport {
            checked: ids.len(),
            drifted: drifted.into_inner(),
            failed: failed.into_inner(),
        };
        debug!(?report, "Reconciliation sweep finished");
        Ok(report)
    }

    async fn load_event(&self, event_id: i64) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EventDeskError::not_found("Event", event_id))
    }
}

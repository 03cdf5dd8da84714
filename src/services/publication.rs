//! Event publication workflow
//!
//! Events start PENDING, and an admin either publishes them or rejects them
//! (CANCELED). Owners may edit and resubmit an event until it is published.
//! Edits are planned by pure functions that run every check before anything
//! is written, so a rejected edit leaves the stored event untouched.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use crate::database::DatabaseService;
use crate::models::{
    AdminEventUpdate, AdminStateAction, CreateEventRequest, Event, EventState, EventView, OwnerEventUpdate,
    OwnerStateAction,
};
use crate::services::locks::EventLocks;
use crate::services::stats::{HitInfo, StatsService};
use crate::utils::errors::{ConflictReason, EventDeskError, Result};
use crate::utils::helpers::page_bounds;
use crate::utils::logging::{log_admin_action, log_event_action};

/// Minimum lead time between an owner's edit and the event
pub const OWNER_LEAD_HOURS: i64 = 2;
/// Minimum gap between publication and the event for admin date changes
pub const ADMIN_LEAD_HOURS: i64 = 1;

/// Fail unless `event_date` is at least `hours` after `anchor_time`
pub fn check_lead_time(
    event_date: DateTime<Utc>,
    anchor_time: DateTime<Utc>,
    hours: i64,
    anchor: &'static str,
) -> Result<()> {
    if event_date < anchor_time + Duration::hours(hours) {
        return Err(ConflictReason::EventDateTooSoon { hours, anchor }.into());
    }
    Ok(())
}

/// Event as it will look after an owner edit
pub fn plan_owner_edit(event: &Event, update: &OwnerEventUpdate, now: DateTime<Utc>) -> Result<Event> {
    if event.state == EventState::Published {
        return Err(ConflictReason::EventPublished.into());
    }
    if let Some(event_date) = update.changes.event_date {
        check_lead_time(event_date, now, OWNER_LEAD_HOURS, "now")?;
    }

    let mut planned = event.clone();
    update.changes.apply_to(&mut planned);
    match update.state_action {
        Some(OwnerStateAction::SendToReview) => planned.state = EventState::Pending,
        Some(OwnerStateAction::CancelReview) => planned.state = EventState::Canceled,
        None => {}
    }
    Ok(planned)
}

/// Event as it will look after an admin edit
pub fn plan_admin_edit(event: &Event, update: &AdminEventUpdate, now: DateTime<Utc>) -> Result<Event> {
    if let (Some(event_date), Some(published_on)) = (update.changes.event_date, event.published_on) {
        check_lead_time(event_date, published_on, ADMIN_LEAD_HOURS, "publication")?;
    }
    if let Some(limit) = update.changes.participant_limit {
        if limit > 0 && limit < event.confirmed_requests {
            return Err(ConflictReason::LimitBelowConfirmed {
                limit,
                confirmed: event.confirmed_requests,
            }
            .into());
        }
    }
    if update.state_action.is_some() && event.state != EventState::Pending {
        return Err(ConflictReason::NotAwaitingPublication {
            state: event.state.to_string(),
        }
        .into());
    }

    let mut planned = event.clone();
    update.changes.apply_to(&mut planned);
    match update.state_action {
        Some(AdminStateAction::PublishEvent) => {
            planned.state = EventState::Published;
            planned.published_on = Some(now);
        }
        Some(AdminStateAction::RejectEvent) => planned.state = EventState::Canceled,
        None => {}
    }
    Ok(planned)
}

#[derive(Debug, Clone)]
pub struct PublicationService {
    db: DatabaseService,
    locks: EventLocks,
    stats: StatsService,
}

impl PublicationService {
    pub fn new(db: DatabaseService, locks: EventLocks, stats: StatsService) -> Self {
        Self { db, locks, stats }
    }

    pub async fn create_event(&self, owner_id: i64, draft: &CreateEventRequest) -> Result<Event> {
        draft.validate()?;
        check_lead_time(draft.event_date, Utc::now(), OWNER_LEAD_HOURS, "now")?;

        let event = self.db.events.create(owner_id, draft).await?;
        log_event_action(event.id, "created", owner_id, None);
        Ok(event)
    }

    pub async fn update_event_by_owner(
        &self,
        owner_id: i64,
        event_id: i64,
        update: &OwnerEventUpdate,
    ) -> Result<Event> {
        update.changes.validate()?;
        let _guard = self.locks.acquire(event_id).await;

        let event = self.get_owner_event(owner_id, event_id).await?;
        let planned = plan_owner_edit(&event, update, Utc::now())?;
        let stored = self.db.events.update(&planned).await?;

        log_event_action(event_id, "owner_edit", owner_id, Some(stored.state.as_str()));
        Ok(stored)
    }

    pub async fn update_event_by_admin(&self, event_id: i64, update: &AdminEventUpdate) -> Result<Event> {
        update.changes.validate()?;
        let _guard = self.locks.acquire(event_id).await;

        let event = self.load_event(event_id).await?;
        let planned = plan_admin_edit(&event, update, Utc::now())?;
        let stored = self.db.events.update(&planned).await?;

        if let Some(action) = update.state_action {
            let action = match action {
                AdminStateAction::PublishEvent => "publish",
                AdminStateAction::RejectEvent => "reject",
            };
            log_admin_action(event_id, action, None);
        } else {
            log_admin_action(event_id, "edit", None);
        }
        Ok(stored)
    }

    /// An event as seen by its owner; other users get NotFound
    pub async fn get_owner_event(&self, owner_id: i64, event_id: i64) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .filter(|event| event.owner_id == owner_id)
            .ok_or_else(|| EventDeskError::not_found("Event", event_id))
    }

    pub async fn list_owner_events(&self, owner_id: i64, from: i64, size: i64) -> Result<Vec<Event>> {
        let (limit, offset) = page_bounds(from, size)?;
        self.db.events.list_by_owner(owner_id, limit, offset).await
    }

    /// Public read of a published event with its view count.
    ///
    /// `hit` is recorded best effort before the views are fetched.
    pub async fn get_published_event(&self, event_id: i64, hit: Option<&HitInfo>) -> Result<EventView> {
        let event = self
            .db
            .events
            .find_by_id(event_id)
            .await?
            .filter(Event::is_published)
            .ok_or_else(|| EventDeskError::not_found("Event", event_id))?;

        if let Some(hit) = hit {
            self.stats.record_hit(hit).await;
        }
        let views = self.stats.get_views(&event).await;
        info!(event_id = event_id, views = views, "Published event read");
        Ok(EventView { event, views })
    }

    async fn load_event(&self, event_id: i64) -> Result<Event> {
        self.db
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| EventDeskError::not_found("Event", event_id))
    }
}

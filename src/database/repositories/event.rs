//! Event repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::database::store::EventStore;
use crate::models::event::{CreateEventRequest, Event};
use crate::utils::errors::{EventDeskError, Result};

const EVENT_COLUMNS: &str = "id, owner_id, title, annotation, description, category_id, location_lat, location_lon, \
    paid, participant_limit, request_moderation, confirmed_requests, state, event_date, created_on, published_on";

#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventStore for EventRepository {
    /// Create a new event
    async fn create(&self, owner_id: i64, request: &CreateEventRequest) -> Result<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (owner_id, title, annotation, description, category_id, location_lat, location_lon,
                                paid, participant_limit, request_moderation, event_date, created_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(owner_id)
        .bind(&request.title)
        .bind(&request.annotation)
        .bind(&request.description)
        .bind(request.category_id)
        .bind(request.location.map(|l| l.lat))
        .bind(request.location.map(|l| l.lon))
        .bind(request.paid)
        .bind(request.participant_limit)
        .bind(request.request_moderation)
        .bind(request.event_date)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Update event
    async fn update(&self, event: &Event) -> Result<Event> {
        let updated = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = $2,
                annotation = $3,
                description = $4,
                category_id = $5,
                location_lat = $6,
                location_lon = $7,
                paid = $8,
                participant_limit = $9,
                request_moderation = $10,
                state = $11,
                event_date = $12,
                published_on = $13
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.annotation)
        .bind(&event.description)
        .bind(event.category_id)
        .bind(event.location_lat)
        .bind(event.location_lon)
        .bind(event.paid)
        .bind(event.participant_limit)
        .bind(event.request_moderation)
        .bind(event.state)
        .bind(event.event_date)
        .bind(event.published_on)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| EventDeskError::not_found("Event", event.id))
    }

    /// Get events created by user
    async fn list_by_owner(&self, owner_id: i64, limit: i64, offset: i64) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE owner_id = $1 ORDER BY event_date DESC, id DESC LIMIT $2 OFFSET $3",
            EVENT_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn list_published_limited_ids(&self) -> Result<Vec<i64>> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM events WHERE state = 'PUBLISHED' AND participant_limit > 0 ORDER BY id"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

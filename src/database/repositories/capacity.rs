//! Capacity tracker backed by the `confirmed_requests` column
//!
//! Every operation runs in one transaction that starts by locking the event
//! row with `SELECT … FOR UPDATE`. Admissions, batch settlements,
//! cancellations and reconciliations of one event therefore serialise across
//! every service instance sharing the database, and the counter never moves
//! apart from the request rows it counts.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;
use crate::database::repositories::request::REQUEST_COLUMNS;
use crate::database::store::{Availability, BatchDecision, CapacityTracker, Reconciliation, ReserveMode, Settlement};
use crate::models::request::{ParticipationRequest, RequestStatus};
use crate::utils::errors::{ConflictReason, EventDeskError, Result};
use crate::utils::logging::log_database_operation;

/// Row returned by the cancel swap: the status before the update plus the updated request
#[derive(FromRow)]
struct CanceledRow {
    prior_status: RequestStatus,
    id: i64,
    event_id: i64,
    requester_id: i64,
    status: RequestStatus,
    created: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PgCapacityTracker {
    pool: PgPool,
}

impl PgCapacityTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Lock the event row for the rest of the transaction, returning its limit and counter
async fn lock_event(tx: &mut Transaction<'_, Postgres>, event_id: i64) -> Result<(i32, i32)> {
    let row: Option<(i32, i32)> = sqlx::query_as(
        "SELECT participant_limit, confirmed_requests FROM events WHERE id = $1 FOR UPDATE"
    )
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.ok_or_else(|| EventDeskError::not_found("Event", event_id))
}

/// Take up to `requested` slots inside `tx`, returning how many were granted
async fn reserve_in(
    tx: &mut Transaction<'_, Postgres>,
    event_id: i64,
    requested: u32,
    mode: ReserveMode,
) -> Result<u32> {
    let (limit, confirmed) = lock_event(tx, event_id).await?;
    let granted = mode.grant(limit, confirmed, requested);
    if granted > 0 {
        let delta = i32::try_from(granted)
            .map_err(|_| EventDeskError::bad_request("too many slots requested"))?;
        sqlx::query("UPDATE events SET confirmed_requests = confirmed_requests + $2 WHERE id = $1")
            .bind(event_id)
            .bind(delta)
            .execute(&mut **tx)
            .await?;
    }
    Ok(granted)
}

async fn release_in(tx: &mut Transaction<'_, Postgres>, event_id: i64, count: u32) -> Result<()> {
    let count = i32::try_from(count)
        .map_err(|_| EventDeskError::bad_request("too many slots released"))?;
    let result = sqlx::query("UPDATE events SET confirmed_requests = GREATEST(0, confirmed_requests - $2) WHERE id = $1")
        .bind(event_id)
        .bind(count)
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(EventDeskError::not_found("Event", event_id));
    }
    Ok(())
}

#[async_trait]
impl CapacityTracker for PgCapacityTracker {
    async fn try_reserve(&self, event_id: i64, requested: u32, mode: ReserveMode) -> Result<u32> {
        let mut tx = self.pool.begin().await?;
        let granted = reserve_in(&mut tx, event_id, requested, mode).await?;
        tx.commit().await?;
        Ok(granted)
    }

    async fn release(&self, event_id: i64, count: u32) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        release_in(&mut tx, event_id, count).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn admit(&self, event_id: i64, requester_id: i64, mode: ReserveMode) -> Result<Option<ParticipationRequest>> {
        let mut tx = self.pool.begin().await?;
        if reserve_in(&mut tx, event_id, 1, mode).await? == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let request = sqlx::query_as::<_, ParticipationRequest>(&format!(
            r#"
            INSERT INTO participation_requests (event_id, requester_id, status, created)
            VALUES ($1, $2, 'CONFIRMED', $3)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(event_id)
        .bind(requester_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| EventDeskError::from_insert(e, ConflictReason::DuplicateRequest))?;

        tx.commit().await?;
        Ok(Some(request))
    }

    async fn settle(&self, event_id: i64, request_ids: &[i64], decision: BatchDecision) -> Result<Settlement> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let (limit, confirmed) = lock_event(&mut tx, event_id).await?;
        if Availability::of(limit, confirmed).is_saturated() {
            tx.rollback().await?;
            return Ok(Settlement::Saturated);
        }

        let current: HashMap<i64, (i64, RequestStatus)> = sqlx::query_as::<_, (i64, i64, RequestStatus)>(
            "SELECT id, event_id, status FROM participation_requests WHERE id = ANY($1) FOR UPDATE"
        )
        .bind(request_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(id, owner_event, status)| (id, (owner_event, status)))
        .collect();

        let blocked = request_ids.iter().copied().find(|id| {
            !matches!(current.get(id), Some(&(owner_event, RequestStatus::Pending)) if owner_event == event_id)
        });
        if let Some(request_id) = blocked {
            tx.rollback().await?;
            log_database_operation("settle", "participation_requests", started.elapsed().as_millis() as u64, false);
            return Ok(Settlement::NotPending(request_id));
        }

        let requested = u32::try_from(request_ids.len())
            .map_err(|_| EventDeskError::bad_request("too many requests in one batch"))?;
        let granted = match decision {
            BatchDecision::Reject => 0,
            BatchDecision::Confirm(mode) => reserve_in(&mut tx, event_id, requested, mode).await?,
        };
        let changes = BatchDecision::assign(request_ids, granted);
        let statuses: Vec<String> = changes.iter().map(|(_, status)| status.as_str().to_string()).collect();

        let updated = sqlx::query_as::<_, ParticipationRequest>(
            r#"
            UPDATE participation_requests r
            SET status = c.status::request_status
            FROM UNNEST($1::BIGINT[], $2::TEXT[]) AS c(id, status)
            WHERE r.id = c.id
            RETURNING r.id, r.event_id, r.requester_id, r.status, r.created
            "#
        )
        .bind(request_ids)
        .bind(&statuses)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        log_database_operation("settle", "participation_requests", started.elapsed().as_millis() as u64, true);

        let mut by_id: HashMap<i64, ParticipationRequest> = updated.into_iter().map(|r| (r.id, r)).collect();
        Ok(Settlement::Applied(request_ids.iter().filter_map(|id| by_id.remove(id)).collect()))
    }

    async fn cancel(&self, request_id: i64) -> Result<Option<(RequestStatus, ParticipationRequest)>> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(i64,)> = sqlx::query_as("SELECT event_id FROM participation_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((event_id,)) = owner else {
            tx.rollback().await?;
            return Ok(None);
        };
        lock_event(&mut tx, event_id).await?;

        let row = sqlx::query_as::<_, CanceledRow>(
            r#"
            UPDATE participation_requests r
            SET status = 'CANCELED'
            FROM (SELECT id, status FROM participation_requests WHERE id = $1 FOR UPDATE) prior
            WHERE r.id = prior.id
            RETURNING prior.status AS prior_status, r.id, r.event_id, r.requester_id, r.status, r.created
            "#
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        if row.prior_status == RequestStatus::Confirmed {
            release_in(&mut tx, event_id, 1).await?;
        }
        tx.commit().await?;

        Ok(Some((
            row.prior_status,
            ParticipationRequest {
                id: row.id,
                event_id: row.event_id,
                requester_id: row.requester_id,
                status: row.status,
                created: row.created,
            },
        )))
    }

    async fn availability(&self, event_id: i64) -> Result<Availability> {
        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT participant_limit, confirmed_requests FROM events WHERE id = $1"
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        let (limit, confirmed) = row.ok_or_else(|| EventDeskError::not_found("Event", event_id))?;
        Ok(Availability::of(limit, confirmed))
    }

    async fn reconcile(&self, event_id: i64) -> Result<Reconciliation> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let (_, cached) = lock_event(&mut tx, event_id).await?;

        let (actual,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM participation_requests WHERE event_id = $1 AND status = 'CONFIRMED'"
        )
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await?;
        let actual = i32::try_from(actual)
            .map_err(|_| EventDeskError::Storage(format!("confirmed count overflow for event {}", event_id)))?;

        if actual != cached {
            sqlx::query("UPDATE events SET confirmed_requests = $2 WHERE id = $1")
                .bind(event_id)
                .bind(actual)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        log_database_operation("reconcile", "events", started.elapsed().as_millis() as u64, true);
        Ok(Reconciliation { event_id, cached, actual })
    }
}

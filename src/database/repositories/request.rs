//! Participation request repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;
use crate::database::store::RequestStore;
use crate::models::request::{ParticipationRequest, RequestStatus};
use crate::utils::errors::{ConflictReason, EventDeskError, Result};

pub(super) const REQUEST_COLUMNS: &str = "id, event_id, requester_id, status, created";

#[derive(Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for RequestRepository {
    async fn create(&self, event_id: i64, requester_id: i64, status: RequestStatus) -> Result<ParticipationRequest> {
        sqlx::query_as::<_, ParticipationRequest>(&format!(
            r#"
            INSERT INTO participation_requests (event_id, requester_id, status, created)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(event_id)
        .bind(requester_id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| EventDeskError::from_insert(e, ConflictReason::DuplicateRequest))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ParticipationRequest>> {
        let request = sqlx::query_as::<_, ParticipationRequest>(&format!(
            "SELECT {} FROM participation_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn exists_for(&self, requester_id: i64, event_id: i64) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM participation_requests WHERE requester_id = $1 AND event_id = $2)"
        )
        .bind(requester_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list_by_event(&self, event_id: i64) -> Result<Vec<ParticipationRequest>> {
        let requests = sqlx::query_as::<_, ParticipationRequest>(&format!(
            "SELECT {} FROM participation_requests WHERE event_id = $1 ORDER BY created ASC, id ASC",
            REQUEST_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn list_by_requester(&self, requester_id: i64) -> Result<Vec<ParticipationRequest>> {
        let requests = sqlx::query_as::<_, ParticipationRequest>(&format!(
            "SELECT {} FROM participation_requests WHERE requester_id = $1 ORDER BY created ASC, id ASC",
            REQUEST_COLUMNS
        ))
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn count_by_status(&self, event_id: i64, status: RequestStatus) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM participation_requests WHERE event_id = $1 AND status = $2"
        )
        .bind(event_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

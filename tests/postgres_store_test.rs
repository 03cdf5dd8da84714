//! PostgreSQL backend tests
//!
//! These need Docker (or `TEST_DATABASE_URL`) and are ignored by default:
//! `cargo test --test postgres_store_test -- --ignored`

mod helpers;

use assert_matches::assert_matches;
use futures::future::join_all;
use helpers::*;
use serial_test::serial;
use EventDesk::database::{Availability, BatchDecision, DatabaseService, ReserveMode, Settlement};
use EventDesk::models::{AdminEventUpdate, AdminStateAction, RequestStatus};
use EventDesk::services::{AdmissionService, EventLocks, ServiceFactory, StatsService};
use EventDesk::{ConflictReason, EventDeskError};

fn services(db: &TestDatabase) -> ServiceFactory {
    let mut config = EventDesk::config::Settings::default().stats;
    config.enabled = false;
    let stats = StatsService::from_config(&config).unwrap();
    ServiceFactory::with_stats(DatabaseService::new(db.pool.clone()), stats, None)
}

async fn publish(services: &ServiceFactory, limit: i32, moderation: bool) -> i64 {
    let event = services
        .publication
        .create_event(OWNER_ID, &event_draft(limit, moderation))
        .await
        .unwrap();
    let publish = AdminEventUpdate {
        state_action: Some(AdminStateAction::PublishEvent),
        ..Default::default()
    };
    services.publication.update_event_by_admin(event.id, &publish).await.unwrap().id
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_reservation_is_capped_by_limit() {
    let db = TestDatabase::new().await.unwrap();
    let services = services(&db);
    let event_id = publish(&services, 3, true).await;
    let capacity = &services.database.capacity;

    assert_eq!(capacity.try_reserve(event_id, 2, ReserveMode::WithinLimit).await.unwrap(), 2);
    assert_eq!(capacity.try_reserve(event_id, 2, ReserveMode::WithinLimit).await.unwrap(), 1);
    assert_eq!(capacity.availability(event_id).await.unwrap(), Availability::Slots(0));
    assert_eq!(capacity.try_reserve(event_id, 2, ReserveMode::Unbounded).await.unwrap(), 2);

    capacity.release(event_id, 10).await.unwrap();
    assert_eq!(capacity.availability(event_id).await.unwrap(), Availability::Slots(3));

    let missing = capacity.try_reserve(987_654, 1, ReserveMode::WithinLimit).await;
    assert_matches!(missing, Err(EventDeskError::NotFound { .. }));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_duplicate_request_hits_unique_index() {
    let db = TestDatabase::new().await.unwrap();
    let services = services(&db);
    let event_id = publish(&services, 0, true).await;
    let requests = &services.database.requests;

    requests.create(event_id, FIRST_REQUESTER, RequestStatus::Pending).await.unwrap();
    let duplicate = requests.create(event_id, FIRST_REQUESTER, RequestStatus::Pending).await;
    assert_matches!(duplicate, Err(EventDeskError::Conflict(ConflictReason::DuplicateRequest)));
    assert_eq!(db.count_records("participation_requests").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_settle_admit_and_cancel() {
    let db = TestDatabase::new().await.unwrap();
    let services = services(&db);
    let event_id = publish(&services, 2, true).await;
    let requests = &services.database.requests;
    let capacity = &services.database.capacity;

    let first = requests.create(event_id, 200, RequestStatus::Pending).await.unwrap();
    let second = requests.create(event_id, 201, RequestStatus::Rejected).await.unwrap();

    let blocked = capacity
        .settle(event_id, &[first.id, second.id], BatchDecision::Confirm(ReserveMode::WithinLimit))
        .await
        .unwrap();
    assert_matches!(blocked, Settlement::NotPending(id) if id == second.id);
    assert_eq!(requests.find_by_id(first.id).await.unwrap().unwrap().status, RequestStatus::Pending);
    assert_eq!(capacity.availability(event_id).await.unwrap(), Availability::Slots(2));

    let applied = capacity
        .settle(event_id, &[first.id], BatchDecision::Confirm(ReserveMode::WithinLimit))
        .await
        .unwrap();
    assert_matches!(applied, Settlement::Applied(ref rows) if rows[0].status == RequestStatus::Confirmed);

    let admitted = capacity.admit(event_id, 202, ReserveMode::WithinLimit).await.unwrap().unwrap();
    assert_eq!(admitted.status, RequestStatus::Confirmed);
    assert!(capacity.admit(event_id, 203, ReserveMode::WithinLimit).await.unwrap().is_none());
    assert!(!requests.exists_for(203, event_id).await.unwrap());

    let (prior, canceled) = capacity.cancel(first.id).await.unwrap().unwrap();
    assert_eq!(prior, RequestStatus::Confirmed);
    assert_eq!(canceled.status, RequestStatus::Canceled);
    assert_eq!(capacity.availability(event_id).await.unwrap(), Availability::Slots(1));
    assert!(capacity.cancel(424_242).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_admission_flow_on_postgres() {
    let db = TestDatabase::new().await.unwrap();
    let services = services(&db);
    let event_id = publish(&services, 2, true).await;

    let mut ids = Vec::new();
    for requester in requesters(3) {
        ids.push(services.admission.submit_request(requester, event_id).await.unwrap().id);
    }
    let result = services
        .admission
        .change_request_status(OWNER_ID, event_id, &confirm(&ids))
        .await
        .unwrap();
    assert_eq!(result.confirmed_ids(), ids[..2].to_vec());
    assert_eq!(result.rejected_ids(), ids[2..].to_vec());

    services.admission.cancel_request(FIRST_REQUESTER, ids[0]).await.unwrap();
    let event = services.admission.reconcile_confirmed(event_id).await.unwrap();
    assert_eq!(event.confirmed_requests, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires Docker"]
async fn test_concurrent_submissions_on_postgres() {
    let db = TestDatabase::new().await.unwrap();
    let services = services(&db);
    let event_id = publish(&services, 4, false).await;

    let tasks = requesters(20).into_iter().map(|requester| {
        let admission = services.admission.clone();
        tokio::spawn(async move { admission.submit_request(requester, event_id).await })
    });
    join_all(tasks).await;

    let confirmed = services
        .database
        .requests
        .count_by_status(event_id, RequestStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed, 4);
    let event = services.database.events.find_by_id(event_id).await.unwrap().unwrap();
    assert_eq!(event.confirmed_requests, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires Docker"]
async fn test_instances_with_separate_locks_share_one_limit() {
    let db = TestDatabase::new().await.unwrap();
    let services = services(&db);
    let event_id = publish(&services, 3, false).await;
    let instances = [
        AdmissionService::new(DatabaseService::new(db.pool.clone()), EventLocks::new()),
        AdmissionService::new(DatabaseService::new(db.pool.clone()), EventLocks::new()),
    ];

    let mut tasks = Vec::new();
    for (position, requester) in requesters(12).into_iter().enumerate() {
        let admission = instances[position % 2].clone();
        tasks.push(tokio::spawn(async move {
            let _ = admission.submit_request(requester, event_id).await;
        }));
        let sweeper = instances[(position + 1) % 2].clone();
        tasks.push(tokio::spawn(async move {
            sweeper.reconcile_all(2).await.unwrap();
        }));
    }
    for outcome in join_all(tasks).await {
        outcome.unwrap();
    }

    let confirmed = services
        .database
        .requests
        .count_by_status(event_id, RequestStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed, 3);
    let event = services.database.events.find_by_id(event_id).await.unwrap().unwrap();
    assert_eq!(event.confirmed_requests, 3);
}

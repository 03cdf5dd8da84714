//! Concurrent admission tests
//!
//! Drive many writers at one event from a multi-threaded runtime and check
//! that the participant limit holds and the cached counter matches the rows.

mod helpers;

use futures::future::join_all;
use helpers::*;
use EventDesk::models::RequestStatus;
use EventDesk::{ConflictReason, EventDeskError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submission_storm_never_overbooks() {
    let ctx = TestContext::new();
    let event = ctx.published_event(5, false).await;
    let event_id = event.id;

    let tasks = requesters(40).into_iter().map(|requester| {
        let admission = ctx.services.admission.clone();
        tokio::spawn(async move { admission.submit_request(requester, event_id).await })
    });
    let outcomes: Vec<_> = join_all(tasks).await.into_iter().map(|joined| joined.unwrap()).collect();

    let confirmed = outcomes.iter().filter(|o| matches!(o, Ok(r) if r.status == RequestStatus::Confirmed)).count();
    assert_eq!(confirmed, 5);
    assert!(outcomes.iter().all(|o| matches!(
        o,
        Ok(_) | Err(EventDeskError::Conflict(ConflictReason::ParticipantLimitReached))
    )));

    assert_eq!(ctx.event(event.id).await.confirmed_requests, 5);
    ctx.assert_counter_consistent(event.id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_batches_share_the_limit() {
    let ctx = TestContext::new();
    let event = ctx.published_event(3, true).await;
    let ids = ctx.pending_requests(event.id, &requesters(10)).await;

    let event_id = event.id;
    let halves = [ids[..5].to_vec(), ids[5..].to_vec()];
    let tasks = halves.into_iter().map(|half| {
        let admission = ctx.services.admission.clone();
        tokio::spawn(async move { admission.change_request_status(OWNER_ID, event_id, &confirm(&half)).await })
    });
    let outcomes: Vec<_> = join_all(tasks).await.into_iter().map(|joined| joined.unwrap()).collect();

    let confirmed: usize = outcomes
        .iter()
        .filter_map(|o| o.as_ref().ok())
        .map(|result| result.confirmed_requests.len())
        .sum();
    assert_eq!(confirmed, 3);
    assert_eq!(ctx.confirmed_rows(event.id).await, 3);
    ctx.assert_counter_consistent(event.id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_racing_cancel_keeps_counter_exact() {
    let ctx = TestContext::new();

    for _ in 0..20 {
        let event = ctx.published_event(10, true).await;
        let people = requesters(4);
        let ids = ctx.pending_requests(event.id, &people).await;

        let batch = {
            let admission = ctx.services.admission.clone();
            let (event_id, ids) = (event.id, ids.clone());
            tokio::spawn(async move { admission.change_request_status(OWNER_ID, event_id, &confirm(&ids)).await })
        };
        let cancel = {
            let admission = ctx.services.admission.clone();
            let (requester, request_id) = (people[1], ids[1]);
            tokio::spawn(async move { admission.cancel_request(requester, request_id).await })
        };

        let batch = batch.await.unwrap();
        cancel.await.unwrap().unwrap();

        assert_eq!(ctx.request(ids[1]).await.status, RequestStatus::Canceled);
        match batch {
            Ok(result) => {
                assert_eq!(result.confirmed_requests.len(), 4);
                assert_eq!(ctx.event(event.id).await.confirmed_requests, 3);
            }
            Err(e) => {
                assert!(matches!(e, EventDeskError::Conflict(ConflictReason::RequestNotPending { .. })));
                assert_eq!(ctx.event(event.id).await.confirmed_requests, 0);
            }
        }
        ctx.assert_counter_consistent(event.id).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_events_do_not_block_each_other() {
    let ctx = TestContext::new();
    let mut events = Vec::new();
    for _ in 0..4 {
        events.push(ctx.published_event(2, false).await);
    }

    let mut tasks = Vec::new();
    for event in &events {
        for requester in requesters(6) {
            let admission = ctx.services.admission.clone();
            let event_id = event.id;
            tasks.push(tokio::spawn(async move { admission.submit_request(requester, event_id).await }));
        }
    }
    join_all(tasks).await;

    for event in &events {
        assert_eq!(ctx.event(event.id).await.confirmed_requests, 2);
        ctx.assert_counter_consistent(event.id).await;
    }
}

//! Test context for unified test setup
//!
//! Builds the full service graph over a shared [`MemoryStore`] so tests can
//! drive the public operations and still inspect or tamper with storage.

use std::sync::Arc;
use EventDesk::config::{Settings, StorageBackend};
use EventDesk::database::{DatabaseService, MemoryStore, RequestStore};
use EventDesk::models::{AdminEventUpdate, AdminStateAction, Event, ParticipationRequest, RequestStatus};
use EventDesk::services::{ServiceFactory, StatsService};

use super::test_data::{event_draft, OWNER_ID};

pub struct TestContext {
    pub services: ServiceFactory,
    pub store: Arc<MemoryStore>,
    pub settings: Settings,
}

impl TestContext {
    /// In-memory context with the stats server disabled
    pub fn new() -> Self {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Memory;
        settings.stats.enabled = false;

        let stats = StatsService::from_config(&settings.stats).expect("disabled stats config is valid");
        Self::build(settings, stats)
    }

    /// In-memory context talking to a stats server at `base_url`
    pub fn with_stats_server(base_url: &str) -> Self {
        let mut settings = Settings::default();
        settings.database.backend = StorageBackend::Memory;
        settings.stats.base_url = base_url.to_string();
        settings.stats.timeout_seconds = 1;

        let stats = StatsService::from_config(&settings.stats).expect("stats config is valid");
        Self::build(settings, stats)
    }

    fn build(settings: Settings, stats: StatsService) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let store = Arc::new(MemoryStore::new());
        let database = DatabaseService::from_memory(store.clone());
        let services = ServiceFactory::with_stats(database, stats, None);
        Self { services, store, settings }
    }

    /// Create and publish an event owned by [`OWNER_ID`]
    pub async fn published_event(&self, participant_limit: i32, request_moderation: bool) -> Event {
        let event = self.pending_event(participant_limit, request_moderation).await;
        let publish = AdminEventUpdate {
            state_action: Some(AdminStateAction::PublishEvent),
            ..Default::default()
        };
        self.services
            .publication
            .update_event_by_admin(event.id, &publish)
            .await
            .expect("pending event can be published")
    }

    /// Create an event owned by [`OWNER_ID`] awaiting publication
    pub async fn pending_event(&self, participant_limit: i32, request_moderation: bool) -> Event {
        self.services
            .publication
            .create_event(OWNER_ID, &event_draft(participant_limit, request_moderation))
            .await
            .expect("draft is valid")
    }

    /// Current stored version of an event
    pub async fn event(&self, event_id: i64) -> Event {
        self.services
            .database
            .events
            .find_by_id(event_id)
            .await
            .expect("store is available")
            .expect("event exists")
    }

    pub async fn request(&self, request_id: i64) -> ParticipationRequest {
        RequestStore::find_by_id(self.store.as_ref(), request_id)
            .await
            .expect("store is available")
            .expect("request exists")
    }

    /// Submit one moderated request per requester, returning their ids in order
    pub async fn pending_requests(&self, event_id: i64, requesters: &[i64]) -> Vec<i64> {
        let mut ids = Vec::with_capacity(requesters.len());
        for requester in requesters {
            let request = self
                .services
                .admission
                .submit_request(*requester, event_id)
                .await
                .expect("submission accepted");
            assert_eq!(request.status, RequestStatus::Pending);
            ids.push(request.id);
        }
        ids
    }

    /// CONFIRMED rows of an event, counted from the requests themselves
    pub async fn confirmed_rows(&self, event_id: i64) -> i64 {
        RequestStore::count_by_status(self.store.as_ref(), event_id, RequestStatus::Confirmed)
            .await
            .expect("store is available")
    }

    /// Check the cached counter against the rows
    pub async fn assert_counter_consistent(&self, event_id: i64) {
        let event = self.event(event_id).await;
        assert_eq!(
            event.confirmed_requests as i64,
            self.confirmed_rows(event_id).await,
            "cached confirmed count of event {} drifted",
            event_id
        );
    }
}

//! Stats server integration
//!
//! The stats server counts endpoint hits. This module records a hit for each
//! public event read and asks the server for view totals. Both directions are
//! best effort: a failing stats server never fails an event read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use crate::config::StatsConfig;
use crate::models::Event;
use crate::services::redis::RedisService;
use crate::utils::errors::{EventDeskError, Result};
use crate::utils::helpers::{check_time_range, event_uri, format_stats_timestamp};
use crate::utils::logging::log_api_error;

/// One row of the `/stats` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewStats {
    pub app: String,
    pub uri: String,
    pub hits: i64,
}

/// Body of `POST /hit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointHit {
    pub app: String,
    pub uri: String,
    pub ip: String,
    #[serde(with = "stats_timestamp")]
    pub timestamp: DateTime<Utc>,
}

mod stats_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};
    use crate::utils::helpers::{format_stats_timestamp, parse_stats_timestamp};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_stats_timestamp(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_stats_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Who hit a public endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitInfo {
    pub uri: String,
    pub ip: String,
}

#[async_trait]
pub trait StatsClient: Send + Sync {
    async fn get_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        uris: &[String],
        unique: bool,
    ) -> Result<Vec<ViewStats>>;

    async fn save_hit(&self, hit: &EndpointHit) -> Result<()>;
}

/// `reqwest` client for the stats server HTTP API
#[derive(Debug, Clone)]
pub struct HttpStatsClient {
    client: Client,
    base_url: Url,
}

impl HttpStatsClient {
    pub fn new(config: &StatsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("EventDesk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(&config.base_url)?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn map_send_error(e: reqwest::Error) -> EventDeskError {
        if e.is_timeout() || e.is_connect() {
            EventDeskError::ServiceUnavailable(format!("stats server unreachable: {}", e))
        } else {
            EventDeskError::Http(e)
        }
    }
}

#[async_trait]
impl StatsClient for HttpStatsClient {
    async fn get_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        uris: &[String],
        unique: bool,
    ) -> Result<Vec<ViewStats>> {
        check_time_range(Some(start), Some(end))?;

        let mut request = self
            .client
            .get(self.endpoint("/stats")?)
            .query(&[
                ("start", format_stats_timestamp(start)),
                ("end", format_stats_timestamp(end)),
                ("unique", unique.to_string()),
            ]);
        for uri in uris {
            request = request.query(&[("uris", uri)]);
        }

        let response = request.send().await.map_err(Self::map_send_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EventDeskError::ServiceUnavailable(format!("stats server returned HTTP {}: {}", status, body)));
        }

        let stats: Vec<ViewStats> = response.json().await?;
        debug!(count = stats.len(), "Stats fetched");
        Ok(stats)
    }

    async fn save_hit(&self, hit: &EndpointHit) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("/hit")?)
            .json(hit)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(EventDeskError::ServiceUnavailable(format!(
                "stats server rejected hit with HTTP {}",
                response.status()
            )));
        }
        debug!(uri = %hit.uri, "Hit recorded");
        Ok(())
    }
}

/// Stand-in used when the stats server is disabled
#[derive(Debug, Clone, Default)]
pub struct DisabledStatsClient;

#[async_trait]
impl StatsClient for DisabledStatsClient {
    async fn get_stats(&self, _: DateTime<Utc>, _: DateTime<Utc>, _: &[String], _: bool) -> Result<Vec<ViewStats>> {
        Ok(Vec::new())
    }

    async fn save_hit(&self, _: &EndpointHit) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct StatsService {
    client: Arc<dyn StatsClient>,
    cache: Option<RedisService>,
    app_name: String,
}

impl StatsService {
    pub fn new(client: Arc<dyn StatsClient>, app_name: impl Into<String>) -> Self {
        Self {
            client,
            cache: None,
            app_name: app_name.into(),
        }
    }

    /// Build from configuration; a disabled stats section yields a no-op client
    pub fn from_config(config: &StatsConfig) -> Result<Self> {
        let client: Arc<dyn StatsClient> = if config.enabled {
            Arc::new(HttpStatsClient::new(config)?)
        } else {
            Arc::new(DisabledStatsClient)
        };
        Ok(Self::new(client, config.app_name.clone()))
    }

    pub fn with_cache(mut self, cache: RedisService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Unique views of `event` since publication; 0 when unpublished or when
    /// the stats server cannot answer
    pub async fn get_views(&self, event: &Event) -> i64 {
        let Some(published_on) = event.published_on else {
            return 0;
        };

        let cache_key = format!("views:{}", event.id);
        if let Some(ref cache) = self.cache {
            match cache.get::<i64>(&cache_key).await {
                Ok(Some(views)) => return views,
                Ok(None) => {}
                Err(e) => warn!(event_id = event.id, error = %e, "View cache read failed"),
            }
        }

        let uri = event_uri(event.id);
        let views = match self
            .client
            .get_stats(published_on, Utc::now(), std::slice::from_ref(&uri), true)
            .await
        {
            Ok(stats) => stats.into_iter().find(|s| s.uri == uri).map(|s| s.hits).unwrap_or(0),
            Err(e) => {
                log_api_error("stats", &e.to_string(), Some(&uri));
                return 0;
            }
        };

        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.set(&cache_key, &views, None).await {
                warn!(event_id = event.id, error = %e, "View cache write failed");
            }
        }
        views
    }

    /// Record a hit; failures are logged and swallowed
    pub async fn record_hit(&self, hit: &HitInfo) {
        let hit = EndpointHit {
            app: self.app_name.clone(),
            uri: hit.uri.clone(),
            ip: hit.ip.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.client.save_hit(&hit).await {
            warn!(uri = %hit.uri, error = %e, "Failed to record hit");
        }
    }

    /// Whether the backing server answers; a disabled client always does
    pub async fn health_check(&self) -> bool {
        let now = Utc::now();
        self.client.get_stats(now, now, &[], false).await.is_ok()
    }
}

impl std::fmt::Debug for StatsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsService")
            .field("app_name", &self.app_name)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

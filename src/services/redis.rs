//! Redis cache service
//!
//! Thin JSON cache over Redis with a key prefix and default TTL taken from
//! configuration. Used to memoise view totals fetched from the stats server.

use redis::{Client, AsyncCommands, RedisResult};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use crate::config::RedisConfig;
use crate::utils::errors::{EventDeskError, Result};

#[derive(Clone, Debug)]
pub struct RedisService {
    client: Client,
    config: RedisConfig,
}

impl RedisService {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(EventDeskError::Redis)?;

        Ok(Self { client, config: config.clone() })
    }

    async fn get_connection(&self) -> Result<redis::aio::Connection> {
        self.client.get_async_connection().await
            .map_err(EventDeskError::Redis)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    /// Set a value with `ttl_seconds`, or the configured TTL when `None`
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let mut conn = self.get_connection().await?;
        let serialized = serde_json::to_string(value)?;

        let full_key = self.full_key(key);
        let ttl = ttl_seconds.unwrap_or(self.config.ttl_seconds);

        let _: () = conn.set_ex(&full_key, serialized, ttl).await?;

        debug!(key = %full_key, ttl = ttl, "Value set in Redis");
        Ok(())
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let result: Option<String> = conn.get(&full_key).await?;

        match result {
            Some(data) => {
                let deserialized = serde_json::from_str::<T>(&data)?;
                debug!(key = %full_key, "Value retrieved from Redis");
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    /// PING the server; connection failures report `false` rather than an error
    pub async fn health_check(&self) -> Result<bool> {
        match self.get_connection().await {
            Ok(mut conn) => {
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(response) => Ok(response == "PONG"),
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis for health check");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            prefix: "eventdesk:".to_string(),
            ttl_seconds: 60,
        }
    }

    #[test]
    fn test_keys_are_prefixed() {
        let service = RedisService::new(&config()).unwrap();
        assert_eq!(service.full_key("views:7"), "eventdesk:views:7");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let mut config = config();
        config.url = "not a url".to_string();
        assert!(matches!(RedisService::new(&config), Err(EventDeskError::Redis(_))));
    }
}

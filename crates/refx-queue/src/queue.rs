//! Job queue backed by a Redis list.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::descriptor::JobDescriptor;
use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// List key carrying job descriptors
    pub queue_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_key: "refx:jobs".to_string(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_key: std::env::var("QUEUE_KEY").unwrap_or_else(|_| "refx:jobs".to_string()),
        }
    }
}

/// Ordered, at-least-once job channel between admission and workers.
///
/// `enqueue` appends to the tail; `dequeue` removes the head, blocking up
/// to `block` when empty. A retried job goes back to the tail, so
/// same-tenant ordering is not preserved across retries.
#[async_trait]
pub trait RenderQueue: Send + Sync {
    /// Append a descriptor to the tail.
    async fn enqueue(&self, descriptor: &JobDescriptor) -> QueueResult<()>;

    /// Pop the head, waiting up to `block` for a message. `Ok(None)`
    /// means the queue stayed empty (or a malformed message was dropped).
    async fn dequeue(&self, block: Duration) -> QueueResult<Option<JobDescriptor>>;

    /// Current queue depth.
    async fn len(&self) -> QueueResult<u64>;
}

/// Production queue client. An explicitly constructed handle with its own
/// connect lifecycle, passed to both admission and the worker.
pub struct RedisQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisQueue {
    /// Create a new queue handle.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Verify the connection works. Called once at startup so a bad
    /// queue endpoint is a fatal configuration error, not a per-job one.
    pub async fn connect(&self) -> QueueResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        info!("Connected to job queue at {}", self.config.queue_key);
        Ok(())
    }
}

#[async_trait]
impl RenderQueue for RedisQueue {
    async fn enqueue(&self, descriptor: &JobDescriptor) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(descriptor)?;

        conn.rpush::<_, _, ()>(&self.config.queue_key, payload).await?;

        info!(
            job_id = %descriptor.id,
            retry_count = descriptor.retry_count,
            "Enqueued job descriptor"
        );
        Ok(())
    }

    async fn dequeue(&self, block: Duration) -> QueueResult<Option<JobDescriptor>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // BLPOP with a bounded timeout keeps shutdown responsive.
        let reply: Option<(String, String)> = conn
            .blpop(&self.config.queue_key, block.as_secs_f64())
            .await?;

        let Some((_key, payload)) = reply else {
            return Ok(None);
        };

        match serde_json::from_str::<JobDescriptor>(&payload) {
            Ok(descriptor) => {
                debug!(job_id = %descriptor.id, "Dequeued job descriptor");
                Ok(Some(descriptor))
            }
            Err(e) => {
                // Reject malformed messages here rather than failing deep
                // inside processing. The message is already removed.
                warn!("Dropping malformed queue payload: {}", e);
                Ok(None)
            }
        }
    }

    async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.llen(&self.config.queue_key).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.queue_key, "refx:jobs");
        assert!(config.redis_url.starts_with("redis://"));
    }
}

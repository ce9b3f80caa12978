//! Redis-backed job store.
//!
//! One JSON document per job under `refx:job:{id}` plus a per-owner list
//! for dashboard queries. Rows are never deleted by the pipeline.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};

use refx_models::{JobId, RenderJob};

use crate::error::{StoreError, StoreResult};
use crate::store::JobStore;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key prefix for job documents
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "refx".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            key_prefix: std::env::var("STORE_KEY_PREFIX").unwrap_or_else(|_| "refx".to_string()),
        }
    }
}

/// Production job store client.
pub struct RedisJobStore {
    client: redis::Client,
    config: StoreConfig,
}

impl RedisJobStore {
    /// Create a new store handle.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    /// Verify the connection works.
    pub async fn connect(&self) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        info!("Connected to job store");
        Ok(())
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:job:{}", self.config.key_prefix, id)
    }

    fn owner_key(&self, owner_id: &str) -> String {
        format!("{}:owner:{}:jobs", self.config.key_prefix, owner_id)
    }

    async fn load(&self, id: &JobId) -> StoreResult<Option<RenderJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(self.job_key(id)).await?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, job: &RenderJob) -> StoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        conn.set::<_, _, ()>(self.job_key(&job.id), payload).await?;
        Ok(())
    }

    /// Read-modify-write a row through a `RenderJob` transition.
    async fn mutate<F, T>(&self, id: &JobId, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut RenderJob) -> StoreResult<T> + Send,
    {
        let mut job = self
            .load(id)
            .await?
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        let out = f(&mut job)?;
        self.save(&job).await?;
        Ok(out)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn insert(&self, job: &RenderJob) -> StoreResult<()> {
        self.save(job).await?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        // Newest first for owner listings.
        conn.lpush::<_, _, ()>(self.owner_key(&job.owner_id), job.id.to_string())
            .await?;

        info!(job_id = %job.id, owner_id = %job.owner_id, "Inserted render job");
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<RenderJob>> {
        self.load(id).await
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<RenderJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ids: Vec<String> = conn.lrange(self.owner_key(owner_id), 0, -1).await?;

        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.load(&JobId::from_string(id)).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn mark_processing(&self, id: &JobId) -> StoreResult<()> {
        self.mutate(id, |job| {
            job.begin_attempt()?;
            Ok(())
        })
        .await?;
        debug!(job_id = %id, "Marked processing");
        Ok(())
    }

    async fn record_progress(&self, id: &JobId, progress: u8) -> StoreResult<()> {
        self.mutate(id, |job| {
            // Regressions are discarded by the model; not an error.
            job.record_progress(progress);
            Ok(())
        })
        .await
    }

    async fn complete(&self, id: &JobId, output_url: &str) -> StoreResult<()> {
        self.mutate(id, |job| {
            job.complete(output_url)?;
            Ok(())
        })
        .await?;
        info!(job_id = %id, "Marked completed");
        Ok(())
    }

    async fn schedule_retry(&self, id: &JobId) -> StoreResult<u32> {
        let count = self
            .mutate(id, |job| {
                let count = job.schedule_retry()?;
                Ok(count)
            })
            .await?;
        info!(job_id = %id, retry_count = count, "Scheduled retry");
        Ok(count)
    }

    async fn fail(&self, id: &JobId, error_detail: &str) -> StoreResult<()> {
        self.mutate(id, |job| {
            job.fail(error_detail)?;
            Ok(())
        })
        .await?;
        info!(job_id = %id, "Marked failed");
        Ok(())
    }
}

//! In-memory job store for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use refx_models::{JobId, RenderJob};

use crate::error::{StoreError, StoreResult};
use crate::store::JobStore;

/// Map-backed store with the same transition semantics as production.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, RenderJob>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mutate<F, T>(&self, id: &JobId, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut RenderJob) -> StoreResult<T> + Send,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id.as_str())
            .ok_or_else(|| StoreError::not_found(id.to_string()))?;
        f(job)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &RenderJob) -> StoreResult<()> {
        self.jobs
            .write()
            .await
            .insert(job.id.to_string(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<RenderJob>> {
        Ok(self.jobs.read().await.get(id.as_str()).cloned())
    }

    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<RenderJob>> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<RenderJob> = jobs
            .values()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn mark_processing(&self, id: &JobId) -> StoreResult<()> {
        self.mutate(id, |job| {
            job.begin_attempt()?;
            Ok(())
        })
        .await
    }

    async fn record_progress(&self, id: &JobId, progress: u8) -> StoreResult<()> {
        self.mutate(id, |job| {
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
        .await
    }

    async fn schedule_retry(&self, id: &JobId) -> StoreResult<u32> {
        self.mutate(id, |job| {
            let count = job.schedule_retry()?;
            Ok(count)
        })
        .await
    }

    async fn fail(&self, id: &JobId, error_detail: &str) -> StoreResult<()> {
        self.mutate(id, |job| {
            job.fail(error_detail)?;
            Ok(())
        })
        .await
    }
}

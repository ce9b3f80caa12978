//! Job store contract.

use async_trait::async_trait;

use refx_models::{JobId, RenderJob};

use crate::error::StoreResult;

/// Row-level access to the job store.
///
/// Mutating methods apply the corresponding `RenderJob` transition and
/// persist the result; an illegal transition (in particular, any write to
/// a terminal row) surfaces as `StoreError::IllegalTransition` and leaves
/// the row untouched. A given row is only ever mutated by the worker that
/// currently owns the job, so plain read-modify-write per row is safe.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly admitted job.
    async fn insert(&self, job: &RenderJob) -> StoreResult<()>;

    /// Fetch a row by id.
    async fn get(&self, id: &JobId) -> StoreResult<Option<RenderJob>>;

    /// All jobs for a tenant, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> StoreResult<Vec<RenderJob>>;

    /// Claim: `pending -> processing`, progress 0, error cleared.
    async fn mark_processing(&self, id: &JobId) -> StoreResult<()>;

    /// Write a progress value. Regressed or out-of-order values are
    /// discarded without error.
    async fn record_progress(&self, id: &JobId, progress: u8) -> StoreResult<()>;

    /// `processing -> completed` with the published artifact URL.
    async fn complete(&self, id: &JobId, output_url: &str) -> StoreResult<()>;

    /// `processing -> pending` with the retry counter incremented.
    /// Returns the new count, which the re-enqueued descriptor must carry.
    async fn schedule_retry(&self, id: &JobId) -> StoreResult<u32>;

    /// `processing -> failed` with captured failure text.
    async fn fail(&self, id: &JobId, error_detail: &str) -> StoreResult<()>;
}

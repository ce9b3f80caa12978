//! The render worker loop.
//!
//! Each iteration claims one descriptor from the queue and drives it
//! through the attempt lifecycle: mark processing, encode, publish, then
//! resolve the row as completed, retried, or failed. All failures are
//! contained; nothing that happens to one job stops the loop.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::{counter, histogram};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use refx_media::{EncodeRequest, Encoder, ProgressFn};
use refx_queue::{JobDescriptor, RenderQueue};
use refx_storage::ArtifactPublisher;
use refx_store::{JobStore, StoreError};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Processes render jobs from the queue, one at a time.
pub struct Worker {
    config: WorkerConfig,
    queue: Arc<dyn RenderQueue>,
    store: Arc<dyn JobStore>,
    encoder: Arc<dyn Encoder>,
    publisher: Arc<dyn ArtifactPublisher>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn RenderQueue>,
        store: Arc<dyn JobStore>,
        encoder: Arc<dyn Encoder>,
        publisher: Arc<dyn ArtifactPublisher>,
    ) -> Self {
        Self {
            config,
            queue,
            store,
            encoder,
            publisher,
        }
    }

    /// Run the consumption loop until shutdown is signalled.
    ///
    /// Shutdown only interrupts the idle wait on the queue. Once a
    /// descriptor has been claimed it is driven to completion before the
    /// loop can exit, so a signal mid-encode never strands a row in
    /// processing.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> WorkerResult<()> {
        info!(max_retries = self.config.max_retries, "Starting render worker");

        loop {
            let descriptor = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping worker");
                        break;
                    }
                    continue;
                }
                result = self.queue.dequeue(self.config.dequeue_block) => match result {
                    Ok(Some(descriptor)) => descriptor,
                    Ok(None) => continue,
                    Err(e) => {
                        error!("Queue error: {}", e);
                        tokio::time::sleep(self.config.error_backoff).await;
                        continue;
                    }
                }
            };

            self.process_descriptor(descriptor).await;
        }

        info!("Render worker stopped");
        Ok(())
    }

    /// Claim and process at most one descriptor.
    ///
    /// Returns `Ok(true)` when a descriptor was handled, `Ok(false)` when
    /// the queue was empty. Errors here are queue-level only; per-job
    /// failures are resolved against the job row instead.
    pub async fn process_next(&self) -> WorkerResult<bool> {
        let Some(descriptor) = self.queue.dequeue(self.config.dequeue_block).await? else {
            return Ok(false);
        };

        self.process_descriptor(descriptor).await;
        Ok(true)
    }

    async fn process_descriptor(&self, descriptor: JobDescriptor) {
        let job_id = descriptor.id.clone();
        info!(
            job_id = %job_id,
            retry_count = descriptor.retry_count,
            "Claimed render job"
        );

        // Claim the row. Rows that are missing or already terminal mean a
        // stale redelivery; drop the descriptor.
        match self.store.mark_processing(&job_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                warn!(job_id = %job_id, "Descriptor for unknown job, dropping");
                return;
            }
            Err(StoreError::IllegalTransition(_)) => {
                warn!(job_id = %job_id, "Descriptor for settled job, dropping");
                return;
            }
            Err(e) => {
                // The row could not be claimed; put the descriptor back so
                // the job is not lost while the store is unhealthy.
                error!(job_id = %job_id, error = %e, "Failed to claim job, requeueing");
                if let Err(e) = self.queue.enqueue(&descriptor).await {
                    error!(job_id = %job_id, error = %e, "Requeue after claim failure also failed");
                }
                tokio::time::sleep(self.config.error_backoff).await;
                return;
            }
        }

        match self.run_attempt(&descriptor).await {
            Ok(output_url) => {
                match self.store.complete(&job_id, &output_url).await {
                    Ok(()) => {
                        counter!("refx_jobs_completed_total").increment(1);
                        info!(job_id = %job_id, output_url = %output_url, "Job completed");
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Failed to record completion");
                    }
                }
            }
            Err(e) => self.resolve_failure(&descriptor, e).await,
        }
    }

    /// One encode-and-publish attempt. Returns the public artifact URL.
    async fn run_attempt(&self, descriptor: &JobDescriptor) -> WorkerResult<String> {
        let job_dir = self.config.work_dir.join(descriptor.id.as_str());
        tokio::fs::create_dir_all(&job_dir).await?;

        let result = self.encode_and_publish(descriptor, &job_dir).await;

        // Scratch space is per-attempt; removal failure is not a job failure.
        if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
            warn!(job_id = %descriptor.id, error = %e, "Failed to clean work dir");
        }

        result
    }

    async fn encode_and_publish(
        &self,
        descriptor: &JobDescriptor,
        job_dir: &std::path::Path,
    ) -> WorkerResult<String> {
        let output_path = job_dir.join("output.mp4");

        let request = EncodeRequest {
            input_url: descriptor.input_url.clone(),
            effects: descriptor.effects.clone(),
            output_path: output_path.clone(),
        };

        let (on_progress, bridge) = self.progress_bridge(descriptor.id.clone());
        let encode_started = std::time::Instant::now();
        let encode_result = self.encoder.encode(&request, on_progress).await;
        histogram!("refx_encode_duration_seconds").record(encode_started.elapsed().as_secs_f64());
        // The sink closes once the callback Arc held by the encoder drops;
        // awaiting it orders all progress writes before publication.
        let _ = bridge.await;
        encode_result?;

        let key = artifact_key(descriptor);
        let url = self.publisher.publish(&output_path, &key).await?;
        Ok(url)
    }

    /// Bridge the encoder's synchronous progress callback onto the store.
    ///
    /// Values that do not advance past the last written one are dropped
    /// here, so redundant callbacks never turn into store writes.
    fn progress_bridge(
        &self,
        job_id: refx_models::JobId,
    ) -> (ProgressFn, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
        let store = Arc::clone(&self.store);

        let handle = tokio::spawn(async move {
            let mut last: Option<u8> = None;
            while let Some(pct) = rx.recv().await {
                if last.is_some_and(|l| pct <= l) {
                    debug!(job_id = %job_id, pct, "Discarding non-advancing progress");
                    continue;
                }
                last = Some(pct);
                if let Err(e) = store.record_progress(&job_id, pct).await {
                    warn!(job_id = %job_id, error = %e, "Failed to record progress");
                }
            }
        });

        let on_progress: ProgressFn = Arc::new(move |pct| {
            let _ = tx.send(pct);
        });
        (on_progress, handle)
    }

    /// Resolve a failed attempt: requeue while retries remain, otherwise
    /// mark the job failed.
    async fn resolve_failure(&self, descriptor: &JobDescriptor, err: WorkerError) {
        let job_id = &descriptor.id;
        let detail = err.detail();

        // The row's count is authoritative; a redelivered descriptor may
        // carry a stale one, and trusting it could push the row past the
        // retry cap.
        let retry_count = match self.store.get(job_id).await {
            Ok(Some(row)) => row.retry_count,
            Ok(None) => descriptor.retry_count,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not read row for retry decision");
                descriptor.retry_count
            }
        };

        warn!(
            job_id = %job_id,
            retry_count,
            error = %detail,
            "Render attempt failed"
        );

        if retry_count < self.config.max_retries {
            let new_count = match self.store.schedule_retry(job_id).await {
                Ok(count) => count,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to schedule retry");
                    return;
                }
            };

            let next = descriptor.clone().with_retry_count(new_count);
            match self.queue.enqueue(&next).await {
                Ok(()) => {
                    counter!("refx_jobs_retried_total").increment(1);
                    info!(job_id = %job_id, retry_count = new_count, "Requeued for retry");
                }
                Err(e) => {
                    // The row is pending but no descriptor carries it; this
                    // needs operator attention, so make it loud.
                    error!(
                        job_id = %job_id,
                        retry_count = new_count,
                        error = %e,
                        "Retry scheduled but requeue failed, job is stranded"
                    );
                }
            }
        } else {
            match self.store.fail(job_id, &detail).await {
                Ok(()) => {
                    counter!("refx_jobs_failed_total").increment(1);
                    info!(job_id = %job_id, retry_count, "Job failed permanently");
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Failed to record permanent failure");
                }
            }
        }
    }
}

/// Storage key for a job's rendered artifact.
fn artifact_key(descriptor: &JobDescriptor) -> String {
    format!("renders/{}/{}.mp4", descriptor.owner_id, descriptor.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_key_shape() {
        let descriptor = JobDescriptor {
            id: refx_models::JobId::from_string("job-1"),
            owner_id: "alice".to_string(),
            input_url: "https://example.com/in.mp4".to_string(),
            effects: vec![],
            retry_count: 0,
        };
        assert_eq!(artifact_key(&descriptor), "renders/alice/job-1.mp4");
    }
}

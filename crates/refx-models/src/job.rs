//! Render job row model and status lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::Effect;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Render job status.
///
/// `pending` and `processing` are the only non-terminal states. The one
/// legal backward edge is `processing -> pending`, taken when the worker
/// schedules a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue for a worker.
    #[default]
    Pending,
    /// Claimed by a worker, encode in flight.
    Processing,
    /// Artifact published; `output_url` is set.
    Completed,
    /// Retries exhausted; `error_detail` is set.
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attempted status change outside the legal graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A render job: the unit of work and of durable state.
///
/// Created by admission with `status = pending`; mutated exclusively by
/// the worker that owns it thereafter. `id`, `owner_id`, `input_url` and
/// `effects` are immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RenderJob {
    /// Unique job ID, assigned at admission.
    pub id: JobId,

    /// Submitting tenant.
    pub owner_id: String,

    /// Location of the source media (URL or path FFmpeg can read).
    pub input_url: String,

    /// Requested transformations.
    pub effects: Vec<Effect>,

    /// Current status.
    #[serde(default)]
    pub status: JobStatus,

    /// Progress percentage, 0-100. Monotonically non-decreasing within a
    /// processing attempt; reset to 0 at the start of each attempt.
    #[serde(default)]
    pub progress: u8,

    /// Retry attempts consumed so far.
    #[serde(default)]
    pub retry_count: u32,

    /// Stable URL of the published artifact. Set exactly once, on the
    /// transition into `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    /// Captured failure text. Set only on the transition into `failed`;
    /// cleared when a fresh attempt begins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Refreshed on every status or progress write.
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    /// Create a new pending job.
    pub fn new(owner_id: impl Into<String>, input_url: impl Into<String>, effects: Vec<Effect>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            owner_id: owner_id.into(),
            input_url: input_url.into(),
            effects,
            status: JobStatus::Pending,
            progress: 0,
            retry_count: 0,
            output_url: None,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn check_transition(&self, to: JobStatus) -> Result<(), TransitionError> {
        use JobStatus::*;
        let legal = matches!(
            (self.status, to),
            (Pending, Processing) | (Processing, Completed) | (Processing, Pending) | (Processing, Failed)
        );
        if legal {
            Ok(())
        } else {
            Err(TransitionError { from: self.status, to })
        }
    }

    /// Claim the job: `pending -> processing`, progress reset, stale
    /// error detail cleared. This write is the worker's ownership signal.
    pub fn begin_attempt(&mut self) -> Result<(), TransitionError> {
        self.check_transition(JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.progress = 0;
        self.error_detail = None;
        self.touch();
        Ok(())
    }

    /// Record a progress event. Returns `true` when the value was
    /// written; regressed or out-of-range values are discarded, and
    /// progress is only meaningful while processing.
    pub fn record_progress(&mut self, progress: u8) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        let progress = progress.min(100);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.touch();
        true
    }

    /// Finish the job: `processing -> completed`, output URL recorded,
    /// progress forced to 100.
    pub fn complete(&mut self, output_url: impl Into<String>) -> Result<(), TransitionError> {
        self.check_transition(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.output_url = Some(output_url.into());
        self.progress = 100;
        self.touch();
        Ok(())
    }

    /// Schedule a retry: the one legal backward edge,
    /// `processing -> pending`, with the retry counter incremented and
    /// progress reset. Returns the new retry count for the re-enqueued
    /// descriptor.
    pub fn schedule_retry(&mut self) -> Result<u32, TransitionError> {
        self.check_transition(JobStatus::Pending)?;
        self.status = JobStatus::Pending;
        self.retry_count += 1;
        self.progress = 0;
        self.touch();
        Ok(self.retry_count)
    }

    /// Give up: `processing -> failed` with the captured failure text.
    pub fn fail(&mut self, error_detail: impl Into<String>) -> Result<(), TransitionError> {
        self.check_transition(JobStatus::Failed)?;
        self.status = JobStatus::Failed;
        self.error_detail = Some(error_detail.into());
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> RenderJob {
        RenderJob::new("user-1", "https://example.com/in.mp4", vec![Effect::Blur])
    }

    #[test]
    fn new_job_is_pending_with_zero_progress() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.retry_count, 0);
        assert!(job.output_url.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut job = job();
        job.begin_attempt().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.record_progress(40));
        job.complete("https://cdn.example.com/out.mp4").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.output_url.is_some());
    }

    #[test]
    fn output_url_only_on_completed() {
        let mut job = job();
        job.begin_attempt().unwrap();
        job.fail("boom").unwrap();
        assert!(job.output_url.is_none());
        assert!(job.error_detail.is_some());
    }

    #[test]
    fn retry_is_the_only_backward_edge() {
        let mut job = job();
        job.begin_attempt().unwrap();
        assert!(job.record_progress(30));
        let count = job.schedule_retry().unwrap();
        assert_eq!(count, 1);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);

        // A fresh attempt clears the previous error detail.
        job.error_detail = Some("previous failure".into());
        job.begin_attempt().unwrap();
        assert!(job.error_detail.is_none());
    }

    #[test]
    fn terminal_states_are_never_overwritten() {
        let mut job = job();
        job.begin_attempt().unwrap();
        job.complete("https://cdn.example.com/out.mp4").unwrap();

        assert!(job.begin_attempt().is_err());
        assert!(job.fail("late failure").is_err());
        assert!(job.schedule_retry().is_err());
        assert_eq!(job.status, JobStatus::Completed);

        let mut failed = RenderJob::new("u", "in", vec![]);
        failed.begin_attempt().unwrap();
        failed.fail("boom").unwrap();
        assert!(failed.begin_attempt().is_err());
        assert!(failed.complete("url").is_err());
    }

    #[test]
    fn progress_never_regresses_within_an_attempt() {
        let mut job = job();
        job.begin_attempt().unwrap();
        assert!(job.record_progress(50));
        assert!(!job.record_progress(30));
        assert_eq!(job.progress, 50);
        assert!(!job.record_progress(50));
        assert!(job.record_progress(51));
    }

    #[test]
    fn progress_ignored_outside_processing() {
        let mut job = job();
        assert!(!job.record_progress(10));
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn job_serde_roundtrip() {
        let mut job = job();
        job.begin_attempt().unwrap();
        job.record_progress(12);

        let json = serde_json::to_string(&job).unwrap();
        let decoded: RenderJob = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.status, JobStatus::Processing);
        assert_eq!(decoded.progress, 12);
    }
}

//! Job descriptor wire format.

use serde::{Deserialize, Serialize};

use refx_models::{Effect, JobId, RenderJob};

/// The message carried on the queue: a minimal, self-contained copy of
/// the fields a worker needs to act. Never the full row, so queue
/// messages stay small and don't race stale copies of store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Job ID, matching the stored row.
    pub id: JobId,
    /// Submitting tenant.
    pub owner_id: String,
    /// Source media location.
    pub input_url: String,
    /// Requested transformations.
    pub effects: Vec<Effect>,
    /// Retry attempts consumed when this descriptor was enqueued. Must
    /// agree with the row at the point a retry is enqueued.
    #[serde(default)]
    pub retry_count: u32,
}

impl JobDescriptor {
    /// Build the initial descriptor for a freshly admitted job.
    pub fn for_job(job: &RenderJob) -> Self {
        Self {
            id: job.id.clone(),
            owner_id: job.owner_id.clone(),
            input_url: job.input_url.clone(),
            effects: job.effects.clone(),
            retry_count: job.retry_count,
        }
    }

    /// Fresh descriptor for a retry attempt, carrying the retry count the
    /// worker just persisted on the row.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_copies_job_fields() {
        let job = RenderJob::new("user-7", "https://example.com/a.mp4", vec![Effect::Watermark]);
        let desc = JobDescriptor::for_job(&job);
        assert_eq!(desc.id, job.id);
        assert_eq!(desc.owner_id, "user-7");
        assert_eq!(desc.effects, vec![Effect::Watermark]);
        assert_eq!(desc.retry_count, 0);
    }

    #[test]
    fn descriptor_serde_roundtrip() {
        let job = RenderJob::new("u", "in.mp4", vec![Effect::Blur, Effect::Speed]);
        let desc = JobDescriptor::for_job(&job).with_retry_count(2);

        let json = serde_json::to_string(&desc).unwrap();
        let decoded: JobDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, desc);
    }

    #[test]
    fn unknown_effect_in_payload_is_rejected() {
        let payload = r#"{"id":"j1","owner_id":"u","input_url":"in.mp4","effects":["sepia"],"retry_count":0}"#;
        assert!(serde_json::from_str::<JobDescriptor>(payload).is_err());
    }
}

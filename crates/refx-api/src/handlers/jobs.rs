//! Render job admission and status handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use refx_models::{Effect, JobId, JobStatus, RenderJob};
use refx_queue::JobDescriptor;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Render submission payload.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitJobRequest {
    #[validate(length(min = 1, max = 128))]
    pub owner_id: String,
    #[validate(url)]
    pub input_url: String,
    #[serde(default)]
    pub effects: Vec<String>,
}

#[derive(Serialize)]
pub struct SubmitJobResponse {
    pub id: JobId,
    pub status: JobStatus,
}

/// Job row as exposed over the API.
#[derive(Serialize)]
pub struct JobResponse {
    pub id: JobId,
    pub owner_id: String,
    pub input_url: String,
    pub effects: Vec<Effect>,
    pub status: JobStatus,
    pub progress: u8,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RenderJob> for JobResponse {
    fn from(job: RenderJob) -> Self {
        Self {
            id: job.id,
            owner_id: job.owner_id,
            input_url: job.input_url,
            effects: job.effects,
            status: job.status,
            progress: job.progress,
            retry_count: job.retry_count,
            output_url: job.output_url,
            error_detail: job.error_detail,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub owner_id: String,
}

/// POST /api/render
///
/// Admit a job: validate, persist the pending row, then enqueue the
/// descriptor. Row insert comes first so a worker can never pop a
/// descriptor whose row does not exist yet.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let effects = request
        .effects
        .iter()
        .map(|s| s.parse::<Effect>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let job = RenderJob::new(request.owner_id, request.input_url, effects);
    state.store.insert(&job).await?;
    state.queue.enqueue(&JobDescriptor::for_job(&job)).await?;

    counter!("refx_jobs_enqueued_total").increment(1);
    info!(job_id = %job.id, owner_id = %job.owner_id, "Admitted render job");

    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            id: job.id,
            status: job.status,
        }),
    ))
}

/// GET /api/render/:job_id?owner_id=
///
/// Jobs are owner-scoped; a wrong owner gets the same 404 as a missing
/// job so ids leak nothing.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<JobResponse>> {
    let id = JobId::from_string(job_id);
    let job = state
        .store
        .get(&id)
        .await?
        .filter(|job| job.owner_id == query.owner_id)
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))?;

    Ok(Json(job.into()))
}

/// GET /api/render?owner_id=
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<JobResponse>>> {
    let jobs = state.store.list_for_owner(&query.owner_id).await?;
    Ok(Json(jobs.into_iter().map(Into::into).collect()))
}

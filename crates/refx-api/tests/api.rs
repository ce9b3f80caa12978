//! HTTP surface tests over in-process fakes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use refx_api::{create_router, ApiConfig, AppState};
use refx_models::{Effect, JobStatus, RenderJob};
use refx_queue::{JobDescriptor, QueueResult, RenderQueue};
use refx_store::{JobStore, MemoryJobStore};

#[derive(Default)]
struct MemQueue {
    items: Mutex<VecDeque<JobDescriptor>>,
}

#[async_trait]
impl RenderQueue for MemQueue {
    async fn enqueue(&self, descriptor: &JobDescriptor) -> QueueResult<()> {
        self.items.lock().unwrap().push_back(descriptor.clone());
        Ok(())
    }

    async fn dequeue(&self, _block: Duration) -> QueueResult<Option<JobDescriptor>> {
        Ok(self.items.lock().unwrap().pop_front())
    }

    async fn len(&self) -> QueueResult<u64> {
        Ok(self.items.lock().unwrap().len() as u64)
    }
}

fn test_app() -> (axum::Router, Arc<MemoryJobStore>, Arc<MemQueue>) {
    let store = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(MemQueue::default());
    let state = AppState {
        config: ApiConfig::default(),
        store: store.clone(),
        queue: queue.clone(),
    };
    (create_router(state, None), store, queue)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn submit_creates_pending_row_and_enqueues_descriptor() {
    let (app, store, queue) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/render")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "owner_id": "owner-1",
                "input_url": "https://example.com/in.mp4",
                "effects": ["speed", "watermark"]
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    let id = body["id"].as_str().unwrap().to_string();

    let row = store
        .get(&refx_models::JobId::from_string(id.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, JobStatus::Pending);
    assert_eq!(row.retry_count, 0);
    assert_eq!(row.effects, vec![Effect::Speed, Effect::Watermark]);

    let descriptor = queue.items.lock().unwrap().pop_front().unwrap();
    assert_eq!(descriptor.id.as_str(), id);
    assert_eq!(descriptor.retry_count, 0);
}

#[tokio::test]
async fn unknown_effect_is_rejected_with_400() {
    let (app, store, queue) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/render")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "owner_id": "owner-1",
                "input_url": "https://example.com/in.mp4",
                "effects": ["sepia"]
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("sepia"));

    // Nothing admitted.
    assert!(store.list_for_owner("owner-1").await.unwrap().is_empty());
    assert!(queue.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn non_url_input_is_rejected_with_400() {
    let (app, _store, _queue) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/render")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "owner_id": "owner-1",
                "input_url": "not a url",
                "effects": []
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_job_returns_row_for_its_owner() {
    let (app, store, _queue) = test_app();

    let mut job = RenderJob::new("owner-1", "https://example.com/in.mp4", vec![Effect::Blur]);
    job.begin_attempt().unwrap();
    job.record_progress(40);
    store.insert(&job).await.unwrap();

    let request = Request::builder()
        .uri(format!("/api/render/{}?owner_id=owner-1", job.id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "processing");
    assert_eq!(body["progress"], 40);
    assert!(body.get("output_url").is_none());
}

#[tokio::test]
async fn wrong_owner_gets_404() {
    let (app, store, _queue) = test_app();

    let job = RenderJob::new("owner-1", "https://example.com/in.mp4", vec![]);
    store.insert(&job).await.unwrap();

    let request = Request::builder()
        .uri(format!("/api/render/{}?owner_id=owner-2", job.id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_jobs_is_owner_scoped() {
    let (app, store, _queue) = test_app();

    let mine = RenderJob::new("owner-1", "https://example.com/a.mp4", vec![]);
    let theirs = RenderJob::new("owner-2", "https://example.com/b.mp4", vec![]);
    store.insert(&mine).await.unwrap();
    store.insert(&theirs).await.unwrap();

    let request = Request::builder()
        .uri("/api/render?owner_id=owner-1")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let jobs = body.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], mine.id.as_str());
}

#[tokio::test]
async fn health_endpoint_is_live() {
    let (app, _store, _queue) = test_app();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ready_endpoint_reports_checks() {
    let (app, _store, _queue) = test_app();

    let request = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["queue"]["status"], "ok");
    assert_eq!(body["checks"]["store"]["status"], "ok");
}

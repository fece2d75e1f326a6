//! Test helpers: a mock plate recognizer served over real HTTP, and
//! pipeline builders wired to it.

#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use plate_gate::config::PipelineConfig;
use plate_gate::services::audit_log::DurableLogger;
use plate_gate::services::backoff::BackoffPolicy;
use plate_gate::services::cache::ResultCache;
use plate_gate::services::metrics::MetricsRecorder;
use plate_gate::services::pipeline::RecognitionPipeline;
use plate_gate::services::recognizer::{PlateRecognizerClient, RecognizerSettings};

pub const RECOGNIZE_PATH: &str = "/v1/plate-reader/";

/// How the mock recognizer answers.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub plates: Vec<(&'static str, f64)>,
    /// Number of initial calls answered with HTTP 503.
    pub fail_first: usize,
    /// When set, every call fails with this status and `{error}` body.
    pub error: Option<(u16, &'static str)>,
    pub delay: Option<Duration>,
    pub healthy: bool,
}

impl MockBehavior {
    pub fn plates(plates: &[(&'static str, f64)]) -> Self {
        Self {
            plates: plates.to_vec(),
            fail_first: 0,
            error: None,
            delay: None,
            healthy: true,
        }
    }

    pub fn failing(status: u16, message: &'static str) -> Self {
        Self {
            error: Some((status, message)),
            healthy: false,
            ..Self::plates(&[])
        }
    }

    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What the mock saw in one request.
#[derive(Debug, Clone, Default)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub upload_bytes: usize,
    pub upload_filename: Option<String>,
    pub regions: Option<String>,
    pub camera_id: Option<String>,
}

struct MockState {
    behavior: MockBehavior,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

pub struct MockRecognizer {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockRecognizer {
    pub fn recognize_url(&self) -> String {
        format!("{}{}", self.base_url, RECOGNIZE_PATH)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }
}

async fn mock_recognize(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let call = state.calls.fetch_add(1, Ordering::SeqCst);

    let mut seen = SeenRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ..SeenRequest::default()
    };
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "upload" => {
                seen.upload_filename = field.file_name().map(str::to_string);
                seen.upload_bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0);
            }
            "regions" => seen.regions = field.text().await.ok(),
            "camera_id" => seen.camera_id = field.text().await.ok(),
            _ => {}
        }
    }
    state.seen.lock().unwrap().push(seen);

    let behavior = &state.behavior;
    if let Some(delay) = behavior.delay {
        tokio::time::sleep(delay).await;
    }
    if let Some((status, message)) = behavior.error {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({ "error": message }))).into_response();
    }
    if call < behavior.fail_first {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "warming up" })),
        )
            .into_response();
    }

    let results: Vec<_> = behavior
        .plates
        .iter()
        .map(|(plate, score)| {
            json!({
                "plate": plate.to_lowercase(),
                "score": score,
                "region": { "code": "us-ca", "score": 0.9 },
                "vehicle": { "type": "Sedan", "score": 0.8 },
                "box": { "xmin": 10, "ymin": 20, "xmax": 110, "ymax": 60 }
            })
        })
        .collect();

    Json(json!({
        "processing_time": 87.5,
        "results": results,
        "filename": "mock.jpg",
        "version": 1,
        "timestamp": "2026-10-18T12:00:00.000000Z"
    }))
    .into_response()
}

async fn mock_health(State(state): State<Arc<MockState>>) -> StatusCode {
    if state.behavior.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Serve a mock recognizer on an ephemeral local port.
pub async fn spawn_recognizer(behavior: MockBehavior) -> MockRecognizer {
    let state = Arc::new(MockState {
        behavior,
        calls: AtomicUsize::new(0),
        seen: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route(RECOGNIZE_PATH, post(mock_recognize))
        .route("/v1/health", get(mock_health))
        .with_state(state.clone());

    let base_url = serve(app).await;
    MockRecognizer { base_url, state }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A recognize URL on a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}{RECOGNIZE_PATH}")
}

pub fn fast_retry(max_retries: u32) -> BackoffPolicy {
    BackoffPolicy {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        max_retries,
        backoff_factor: 2.0,
        jitter: true,
    }
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        confidence_threshold: 0.8,
        cache_enabled: true,
        metrics_enabled: true,
        file_logging_enabled: false,
        timeout: Duration::from_secs(5),
        retry: fast_retry(3),
    }
}

pub fn settings(primary_url: &str) -> RecognizerSettings {
    RecognizerSettings {
        primary_url: primary_url.to_string(),
        primary_token: Some("local-token".to_string()),
        fallback_url: "http://127.0.0.1:9/v1/plate-reader/".to_string(),
        fallback_token: None,
        fallback_enabled: false,
        threshold: 0.8,
        regions: Vec::new(),
        timeout: Duration::from_secs(5),
    }
}

pub fn build_pipeline(
    settings: RecognizerSettings,
    config: PipelineConfig,
    audit: DurableLogger,
) -> RecognitionPipeline {
    RecognitionPipeline::new(
        Arc::new(PlateRecognizerClient::new(settings).unwrap()),
        Arc::new(ResultCache::default()),
        Arc::new(MetricsRecorder::new()),
        Arc::new(audit),
        config,
    )
}

pub fn pipeline_for(mock: &MockRecognizer) -> RecognitionPipeline {
    build_pipeline(
        settings(&mock.recognize_url()),
        test_config(),
        DurableLogger::in_memory(),
    )
}

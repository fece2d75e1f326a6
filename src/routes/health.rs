use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub primary_recognizer: ComponentHealth,
    pub cache: CacheHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub endpoint: String,
    pub latency_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct CacheHealth {
    pub enabled: bool,
    pub entries: usize,
}

/// GET /health: primary recognizer liveness and cache status.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let pipeline = &state.pipeline;
    let start = std::time::Instant::now();

    let healthy = pipeline.client().test_connection().await;
    let recognizer = ComponentHealth {
        status: if healthy { "ok" } else { "error" }.to_string(),
        endpoint: pipeline.client().primary_endpoint().to_string(),
        latency_ms: healthy.then(|| start.elapsed().as_millis() as u64),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            primary_recognizer: recognizer,
            cache: CacheHealth {
                enabled: pipeline.config().cache_enabled,
                entries: pipeline.cache().len(),
            },
        },
    };

    (status_code, Json(response))
}

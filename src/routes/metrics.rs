use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

use crate::app_state::AppState;

/// Prometheus metrics scrape endpoint.
/// Returns metrics in Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// GET /api/v1/metrics/export: all recorded operations as CSV.
pub async fn export_csv(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"plate-metrics.csv\"",
            ),
        ],
        state.pipeline.metrics().export_csv(),
    )
}

#[derive(Serialize)]
pub struct OperationStats {
    pub operation: String,
    pub average_latency_ms: f64,
    pub success_rate: f64,
}

/// GET /api/v1/metrics/{operation}: aggregate latency and success rate.
pub async fn operation_stats(
    State(state): State<AppState>,
    Path(operation): Path<String>,
) -> Json<OperationStats> {
    let metrics = state.pipeline.metrics();
    Json(OperationStats {
        average_latency_ms: metrics.average_latency(&operation).as_secs_f64() * 1000.0,
        success_rate: metrics.success_rate(&operation),
        operation,
    })
}

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::app_state::AppState;

pub mod admin;
pub mod health;
pub mod metrics;
pub mod recognize;

/// Upper bound on a request body; single images are capped lower by validation.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// API routes (everything except the Prometheus scrape endpoint).
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/recognize", post(recognize::submit_recognition))
        .route("/api/v1/recognize/bulk", post(recognize::submit_bulk))
        .route("/api/v1/metrics/export", get(metrics::export_csv))
        .route("/api/v1/metrics/{operation}", get(metrics::operation_stats))
        .route("/api/v1/cache/sweep", post(admin::sweep_cache))
        .route("/api/v1/recognizer/endpoint", put(admin::update_endpoint))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

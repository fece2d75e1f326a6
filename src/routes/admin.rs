use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct SweepResponse {
    pub removed: usize,
    pub remaining: usize,
}

/// POST /api/v1/cache/sweep: drop expired cache entries now.
pub async fn sweep_cache(State(state): State<AppState>) -> Json<SweepResponse> {
    let cache = state.pipeline.cache();
    let removed = cache.sweep_expired();
    Json(SweepResponse {
        removed,
        remaining: cache.len(),
    })
}

#[derive(Deserialize)]
pub struct EndpointUpdate {
    pub url: String,
}

#[derive(Serialize)]
pub struct EndpointResponse {
    pub url: String,
}

/// PUT /api/v1/recognizer/endpoint: point the primary recognizer elsewhere.
pub async fn update_endpoint(
    State(state): State<AppState>,
    Json(update): Json<EndpointUpdate>,
) -> Result<Json<EndpointResponse>, ApiError> {
    let client = state.pipeline.client();
    client.update_primary_endpoint(&update.url)?;
    Ok(Json(EndpointResponse {
        url: client.primary_endpoint().to_string(),
    }))
}

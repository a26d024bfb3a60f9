use axum::extract::State;
use axum::Json;
use serde::Serialize;

use voxdub::store::JobCounts;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_depth: usize,
    pub workers: usize,
    pub jobs: JobCounts,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.service.health();
    Json(HealthResponse {
        status: "ok",
        queue_depth: health.queue_depth,
        workers: health.workers,
        jobs: health.jobs,
    })
}

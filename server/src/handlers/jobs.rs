use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use voxdub::JobRecord;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct JobsResponse {
    pub success: bool,
    pub jobs: Vec<JobRecord>,
}

/// `GET /jobs?limit=N`: newest first.
pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Json<JobsResponse> {
    Json(JobsResponse {
        success: true,
        jobs: state.service.recent(query.limit).await,
    })
}

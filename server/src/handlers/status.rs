use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use voxdub::JobError;

use super::StatusMessage;
use crate::state::AppState;

/// `GET /status/{job_id}`
#[tracing::instrument(skip(state))]
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    match state.service.status(&job_id) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(JobError::NotFound(_)) => StatusMessage::not_found("Job not found"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch job status");
            StatusMessage::internal(e)
        }
    }
}

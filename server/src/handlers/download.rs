use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use voxdub::JobError;

use super::StatusMessage;
use crate::state::AppState;

/// `GET /download/{job_id}`: streams the dubbed video as an attachment.
#[tracing::instrument(skip(state))]
pub async fn download_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let download = match state.service.download(&job_id).await {
        Ok(download) => download,
        Err(JobError::NotFound(_)) => return StatusMessage::not_found("Job not found"),
        Err(JobError::NotReady { status, .. }) => {
            return StatusMessage::new(StatusCode::CONFLICT, status.as_str(), "Video not ready")
        }
        Err(JobError::OutputMissing(_)) => {
            return StatusMessage::not_found("Output file not found")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to look up download");
            return StatusMessage::internal(e);
        }
    };

    let file = match tokio::fs::File::open(&download.path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(error = %e, "Output vanished before it could be opened");
            return StatusMessage::not_found("Output file not found");
        }
    };

    tracing::info!(filename = %download.filename, "Serving dubbed video");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.filename.replace('"', "")
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, download.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

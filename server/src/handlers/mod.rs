mod download;
mod health;
mod jobs;
mod status;
mod upload;

use std::fmt::Display;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub use download::download_handler;
pub use health::health_handler;
pub use jobs::list_jobs_handler;
pub use status::job_status_handler;
pub use upload::{upload_error_status, upload_handler};

/// `{status, message}` body used by the job lookup routes.
#[derive(Serialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn new(code: StatusCode, status: &str, message: &str) -> Response {
        (
            code,
            Json(Self {
                status: status.to_string(),
                message: message.to_string(),
            }),
        )
            .into_response()
    }

    pub fn not_found(message: &str) -> Response {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal(error: impl Display) -> Response {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error",
            &error.to_string(),
        )
    }
}

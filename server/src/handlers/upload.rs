use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use serde::Serialize;

use voxdub::{UploadError, UploadReceipt};

use crate::state::AppState;

pub const VIDEO_FIELD: &str = "video";
pub const LANGUAGE_FIELD: &str = "target_language";
pub const DEFAULT_TARGET_LANGUAGE: &str = "en";

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub message: String,
}

impl UploadResponse {
    fn rejected(status: StatusCode, message: String) -> Response {
        (
            status,
            Json(Self {
                success: false,
                job_id: None,
                message,
            }),
        )
            .into_response()
    }
}

/// `POST /upload`: multipart with a `video` file and optional
/// `target_language` text field.
///
/// The video is streamed to disk when `target_language` arrives first;
/// otherwise it is buffered until the language is known.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut target_language: Option<String> = None;
    let mut buffered: Option<(String, axum::body::Bytes)> = None;
    let mut outcome: Option<Result<UploadReceipt, UploadError>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_rejection(e),
        };

        match field.name() {
            Some(LANGUAGE_FIELD) => match field.text().await {
                Ok(text) => target_language = Some(text),
                Err(e) => return multipart_rejection(e),
            },
            Some(VIDEO_FIELD) if outcome.is_none() && buffered.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                tracing::debug!(filename = %filename, "Receiving video");
                match &target_language {
                    Some(language) => {
                        outcome = Some(
                            state
                                .service
                                .submit_upload(&filename, language, field)
                                .await,
                        );
                    }
                    None => match field.bytes().await {
                        Ok(bytes) => buffered = Some((filename, bytes)),
                        Err(e) => return multipart_rejection(e),
                    },
                }
            }
            _ => {}
        }
    }

    let language = target_language.unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string());
    let outcome = match (outcome, buffered) {
        (Some(outcome), _) => outcome,
        (None, Some((filename, bytes))) => {
            let body = stream::iter([Ok::<_, std::convert::Infallible>(bytes)]);
            state.service.submit_upload(&filename, &language, body).await
        }
        (None, None) => Err(UploadError::MissingFile),
    };

    match outcome {
        Ok(receipt) => {
            tracing::info!(job_id = %receipt.job_id, target_language = %language, "Upload accepted");
            (
                StatusCode::OK,
                Json(UploadResponse {
                    success: true,
                    job_id: Some(receipt.job_id),
                    message: receipt.message,
                }),
            )
                .into_response()
        }
        Err(e) => {
            let status = upload_error_status(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "Upload failed");
            } else {
                tracing::warn!(error = %e, "Upload rejected");
            }
            UploadResponse::rejected(status, e.to_string())
        }
    }
}

pub fn upload_error_status(error: &UploadError) -> StatusCode {
    match error {
        UploadError::Busy => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn multipart_rejection(e: MultipartError) -> Response {
    tracing::warn!(error = %e, "Failed to read multipart");
    UploadResponse::rejected(e.status(), format!("Failed to read upload: {}", e.body_text()))
}

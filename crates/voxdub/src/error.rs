use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is not ready (status: {status})")]
    NotReady { id: String, status: JobStatus },

    #[error("Invalid transition for job {id}: {reason}")]
    InvalidTransition { id: String, reason: String },

    #[error("Output file for job {0} is missing")]
    OutputMissing(String),

    #[error("Job storage failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reasons an upload is refused before any job record exists.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No video file provided")]
    MissingFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file type '{extension}'. Allowed: mp4, avi, mov, mkv, webm")]
    DisallowedExtension { extension: String },

    #[error("Invalid target language '{0}'")]
    InvalidLanguage(String),

    #[error("Upload read failed: {0}")]
    Read(String),

    #[error("Failed to store upload '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Server busy, please retry")]
    Busy,

    #[error(transparent)]
    Job(#[from] JobError),
}

impl UploadError {
    /// True for errors caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFile
                | Self::EmptyFilename
                | Self::DisallowedExtension { .. }
                | Self::InvalidLanguage(_)
                | Self::Read(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

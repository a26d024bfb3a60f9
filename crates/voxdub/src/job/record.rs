//! The job record and the partial updates the pipeline applies to it.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::status::JobStatus;
use crate::db::job_repo::JobRow;
use crate::error::JobError;

pub const UPLOADED_MESSAGE: &str = "Video uploaded successfully";

/// One upload's lifecycle, as cached in memory and persisted in `jobs`.
///
/// Serializes to the public status shape; `original_path` and `extra_data`
/// stay internal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub filename: String,
    #[serde(skip)]
    pub original_path: PathBuf,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub target_language: String,
    pub source_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub file_size: u64,
    pub duration: Option<f64>,
    pub output_path: Option<PathBuf>,
    #[serde(skip)]
    pub extra_data: Map<String, Value>,
}

/// A partial change to a [`JobRecord`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub output_path: Option<PathBuf>,
    pub source_language: Option<String>,
    pub extra: Vec<(String, Value)>,
}

impl JobUpdate {
    /// Enter `status` at its progress checkpoint.
    pub fn stage(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            progress: Some(status.checkpoint()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Bump progress within the current status.
    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn completed(output_path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            message: Some(message.into()),
            output_path: Some(output_path),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            progress: Some(0),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_source_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.push((key.into(), value));
        self
    }
}

impl JobRecord {
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        original_path: PathBuf,
        target_language: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            original_path,
            status: JobStatus::Uploaded,
            progress: 0,
            message: UPLOADED_MESSAGE.to_string(),
            target_language: target_language.into(),
            source_language: None,
            created_at: Utc::now(),
            completed_at: None,
            file_size,
            duration: None,
            output_path: None,
            extra_data: Map::new(),
        }
    }

    /// Applies `update`, or leaves the record untouched and returns
    /// `InvalidTransition` if the result would break the lifecycle rules.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), JobError> {
        let next = update.status.unwrap_or(self.status);
        let reject = |reason: String| JobError::InvalidTransition {
            id: self.id.clone(),
            reason,
        };

        if self.status.is_terminal() {
            return Err(reject(format!("job is already {}", self.status)));
        }
        if !self.status.can_transition_to(next) {
            return Err(reject(format!("cannot move from {} to {}", self.status, next)));
        }

        let (progress, output_path) = match next {
            JobStatus::Error => (0, None),
            JobStatus::Completed => {
                if update.progress.is_some_and(|p| p != 100) {
                    return Err(reject("completed jobs must report progress 100".into()));
                }
                let Some(path) = update.output_path else {
                    return Err(reject("completed jobs need an output path".into()));
                };
                (100, Some(path))
            }
            _ => {
                if update.output_path.is_some() {
                    return Err(reject(format!("output path set while {}", next)));
                }
                let progress = update.progress.unwrap_or(self.progress);
                if progress < self.progress {
                    return Err(reject(format!(
                        "progress would decrease from {} to {}",
                        self.progress, progress
                    )));
                }
                if progress >= 100 {
                    return Err(reject(format!("progress {} before completion", progress)));
                }
                (progress, None)
            }
        };

        if next == JobStatus::Completed {
            self.completed_at = Some(Utc::now());
        }
        self.status = next;
        self.progress = progress;
        self.output_path = output_path;
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(language) = update.source_language {
            self.source_language = Some(language);
        }
        for (key, value) in update.extra {
            self.extra_data.insert(key, value);
        }
        Ok(())
    }

    pub fn to_row(&self) -> JobRow {
        JobRow {
            id: self.id.clone(),
            filename: self.filename.clone(),
            original_path: self.original_path.to_string_lossy().into_owned(),
            output_path: self
                .output_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            status: self.status.as_str().to_string(),
            progress: i64::from(self.progress),
            message: self.message.clone(),
            file_size: i64::try_from(self.file_size).unwrap_or(i64::MAX),
            duration: self.duration,
            created_at: format_timestamp(self.created_at),
            completed_at: self.completed_at.map(format_timestamp),
            extra_data: Value::Object(self.extra_data.clone()).to_string(),
        }
    }

    /// Rebuilds a record from a database row. Malformed columns are logged
    /// and replaced rather than failing the whole read, and the result is
    /// brought back in line with its status: only a completed job keeps an
    /// output path, and a failed one sits at progress 0.
    pub fn from_row(row: JobRow) -> Self {
        let status = row.status.parse::<JobStatus>().unwrap_or_else(|e| {
            log::warn!("{} for job {}, treating as error", e, row.id);
            JobStatus::Error
        });
        let extra_data = match serde_json::from_str::<Value>(&row.extra_data) {
            Ok(Value::Object(map)) => map,
            _ => {
                log::warn!("Discarding malformed extra_data for job {}", row.id);
                Map::new()
            }
        };

        let progress = match status {
            JobStatus::Error => 0,
            _ => row.progress.clamp(0, 100) as u8,
        };
        let output_path = match status {
            JobStatus::Completed => row.output_path.map(PathBuf::from),
            _ => None,
        };

        Self {
            filename: row.filename,
            original_path: PathBuf::from(row.original_path),
            status,
            progress,
            message: row.message,
            target_language: row.target_language,
            source_language: row.source_language,
            created_at: parse_timestamp(&row.created_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
            file_size: u64::try_from(row.file_size).unwrap_or(0),
            duration: row.duration,
            output_path,
            extra_data,
            id: row.id,
        }
    }
}

/// Fixed-width UTC timestamps so `created_at` sorts lexically in SQL.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

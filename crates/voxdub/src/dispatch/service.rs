use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::Stream;
use log::{debug, info, warn};

use super::upload;
use crate::error::{JobError, UploadError, WorkerError};
use crate::job::{new_job_id, JobRecord, JobStatus, JobUpdate};
use crate::stages::MediaProbe;
use crate::store::{JobCounts, JobStore};
use crate::worker::{WorkerPool, CANCELLED_MESSAGE};

pub const ACCEPTED_MESSAGE: &str = "Video uploaded successfully. Processing started.";
pub const BUSY_MESSAGE: &str = "Server busy, please retry";
/// Upper bound on `recent(limit)`.
pub const MAX_RECENT_JOBS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub job_id: String,
    pub message: String,
}

/// A finished output ready to be streamed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub path: PathBuf,
    /// `dubbed_{filename}`
    pub filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolHealth {
    pub queue_depth: usize,
    pub workers: usize,
    pub jobs: JobCounts,
}

/// Upload, status, download and listing, independent of the HTTP layer.
pub struct DubbingService {
    store: Arc<JobStore>,
    pool: Arc<WorkerPool>,
    probe: Option<Arc<dyn MediaProbe>>,
    uploads_dir: PathBuf,
    default_recent: usize,
}

impl DubbingService {
    pub fn new(store: Arc<JobStore>, pool: Arc<WorkerPool>, uploads_dir: PathBuf) -> Self {
        Self {
            store,
            pool,
            probe: None,
            uploads_dir,
            default_recent: 10,
        }
    }

    /// Fills `duration` at upload time. Probe failures are only logged.
    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_default_recent(mut self, limit: usize) -> Self {
        self.default_recent = limit.clamp(1, MAX_RECENT_JOBS);
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Stores the upload under `uploads/{id}/`, creates its record and
    /// queues it.
    ///
    /// Nothing is created when validation fails. When the queue is full the
    /// record is kept but marked `error` and `Busy` is returned.
    pub async fn submit_upload<S, B, E>(
        &self,
        filename: &str,
        target_language: &str,
        body: S,
    ) -> Result<UploadReceipt, UploadError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let upload = upload::validate(filename, target_language)?;
        let job_id = new_job_id();

        let job_dir = self.uploads_dir.join(&job_id);
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| UploadError::Io {
                path: job_dir.clone(),
                source: e,
            })?;

        let path = job_dir.join(&upload.filename);
        let file_size = match upload::write_stream(&path, body).await {
            Ok(size) => size,
            Err(e) => {
                remove_dir(&job_dir).await;
                return Err(e);
            }
        };
        debug!("Stored upload for job {} ({} bytes)", job_id, file_size);

        let mut record = JobRecord::new(
            job_id.clone(),
            upload.filename,
            path,
            upload.target_language,
            file_size,
        );
        record.duration = self.probe_duration(&record.original_path).await;

        if let Err(e) = self.store.put_async(record).await {
            remove_dir(&job_dir).await;
            return Err(e.into());
        }

        if let Err(e) = self.pool.submit(job_id.clone()) {
            let message = match e {
                WorkerError::QueueFull => BUSY_MESSAGE,
                WorkerError::ChannelClosed => CANCELLED_MESSAGE,
            };
            warn!("Job {} not queued: {}", job_id, e);
            self.store
                .update_async(&job_id, JobUpdate::failed(message))
                .await?;
            return Err(UploadError::Busy);
        }

        info!(
            "Accepted job {} (queue depth {})",
            job_id,
            self.pool.queue_depth()
        );
        Ok(UploadReceipt {
            job_id,
            message: ACCEPTED_MESSAGE.to_string(),
        })
    }

    pub fn status(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.store.get(job_id)
    }

    /// The dubbed output of a completed job.
    pub async fn download(&self, job_id: &str) -> Result<Download, JobError> {
        let record = self.store.get(job_id)?;
        let path = match (record.status, record.output_path) {
            (JobStatus::Completed, Some(path)) => path,
            (status, _) => {
                return Err(JobError::NotReady {
                    id: record.id,
                    status,
                })
            }
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                warn!("Output for job {} is gone: {}", job_id, path.display());
                return Err(JobError::OutputMissing(record.id));
            }
        }

        Ok(Download {
            content_type: mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string(),
            filename: format!("dubbed_{}", record.filename),
            path,
        })
    }

    /// Newest first. `None` uses the configured default; the limit is
    /// capped at [`MAX_RECENT_JOBS`].
    pub async fn recent(&self, limit: Option<usize>) -> Vec<JobRecord> {
        let limit = limit
            .unwrap_or(self.default_recent)
            .clamp(1, MAX_RECENT_JOBS);
        self.store.list_recent_async(limit).await
    }

    pub fn health(&self) -> PoolHealth {
        PoolHealth {
            queue_depth: self.pool.queue_depth(),
            workers: self.pool.workers(),
            jobs: self.store.counts(),
        }
    }

    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let probe = self.probe.as_ref()?;
        match probe.duration(path).await {
            Ok(seconds) => Some(seconds),
            Err(e) => {
                warn!("Could not probe duration of {}: {}", path.display(), e);
                None
            }
        }
    }
}

async fn remove_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!("Could not clean up {}: {}", dir.display(), e);
    }
}

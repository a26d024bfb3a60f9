//! Periodic housekeeping: lazy flushing of in-progress records and removal
//! of expired jobs with their files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::JobError;
use crate::store::JobStore;

// A century; keeps the chrono conversion in range.
const MAX_AGE_HOURS_CAP: u64 = 24 * 365 * 100;

/// Deletes finished jobs older than `max_age` from both store tiers along
/// with their `uploads/{id}` and `processed/{id}` directories.
pub struct RetentionSweeper {
    store: Arc<JobStore>,
    uploads_dir: PathBuf,
    processed_dir: PathBuf,
    max_age: chrono::Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<JobStore>,
        uploads_dir: PathBuf,
        processed_dir: PathBuf,
        max_age: chrono::Duration,
    ) -> Self {
        Self {
            store,
            uploads_dir,
            processed_dir,
            max_age,
        }
    }

    pub fn from_config(store: Arc<JobStore>, config: &Config) -> Self {
        let hours = config.retention.max_age_hours.min(MAX_AGE_HOURS_CAP) as i64;
        Self::new(
            store,
            config.storage.uploads_dir(),
            config.storage.processed_dir(),
            chrono::Duration::hours(hours),
        )
    }

    /// Returns how many jobs were removed.
    pub async fn sweep(&self) -> Result<usize, JobError> {
        let removed = self.store.delete_older_than(self.max_age)?;
        for record in &removed {
            remove_job_dir(&self.uploads_dir.join(&record.id)).await;
            remove_job_dir(&self.processed_dir.join(&record.id)).await;
        }
        if !removed.is_empty() {
            log::info!("Retention sweep removed {} jobs", removed.len());
        }
        Ok(removed.len())
    }
}

async fn remove_job_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => log::debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", dir.display(), e),
    }
}

/// Runs the lazy flush and the retention sweep on their own intervals until
/// `shutdown` fires, then flushes once more.
pub fn spawn_maintenance(
    store: Arc<JobStore>,
    sweeper: RetentionSweeper,
    flush_interval: Duration,
    sweep_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut flush_timer = tokio::time::interval(flush_interval);
        let mut sweep_timer = tokio::time::interval(sweep_interval);
        flush_timer.tick().await; // skip immediate first tick
        sweep_timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = flush_timer.tick() => {
                    let flushed = store.flush_pending();
                    if flushed > 0 {
                        log::debug!("Flushed {} pending job updates", flushed);
                    }
                }
                _ = sweep_timer.tick() => {
                    if let Err(e) = sweeper.sweep().await {
                        log::error!("Retention sweep failed: {}", e);
                    }
                }
            }
        }

        let flushed = store.flush_pending();
        log::info!("Maintenance stopped ({} updates flushed)", flushed);
    })
}

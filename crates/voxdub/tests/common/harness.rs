//! Isolated service instances for integration tests.
//!
//! Each `TestHarness` owns a temp data directory with its own SQLite file,
//! so a second `start` on the same harness behaves like a server restart.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream;
use tempfile::TempDir;

use voxdub::config::Config;
use voxdub::db::Database;
use voxdub::pipeline::{Pipeline, PipelineConfig};
use voxdub::stages::Stages;
use voxdub::{DubbingService, JobRecord, JobStore, UploadError, UploadReceipt, WorkerPool};

use super::builders::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    /// Harness with default test settings, then `adjust` applied.
    pub fn with_config(adjust: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = adjust(ConfigBuilder::new())
            .data_dir(temp_dir.path().join("data"))
            .build();
        Self { temp_dir, config }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn database_path(&self) -> PathBuf {
        self.config.storage.database_path()
    }

    /// Opens the harness database and restores previous state into a new store.
    pub fn open_store(&self) -> Arc<JobStore> {
        let db = Database::open(&self.database_path()).expect("Failed to open database");
        let store = JobStore::with_database(db);
        store.load_from_database().expect("Failed to load jobs");
        Arc::new(store)
    }

    /// Starts a store, worker pool and service wired the way the server does.
    pub fn start(&self, stages: Stages) -> RunningService {
        let store = self.open_store();
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(PipelineConfig::from_config(&self.config)),
            stages,
            Arc::clone(&store),
        ));
        let pool = Arc::new(WorkerPool::new(
            pipeline,
            self.config.worker.count,
            self.config.worker.queue_capacity,
        ));
        let service = DubbingService::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            self.config.storage.uploads_dir(),
        )
        .with_default_recent(self.config.server.recent_jobs_limit);

        RunningService {
            store,
            pool,
            service,
        }
    }
}

pub struct RunningService {
    pub store: Arc<JobStore>,
    pub pool: Arc<WorkerPool>,
    pub service: DubbingService,
}

impl RunningService {
    pub async fn upload(
        &self,
        filename: &str,
        target_language: &str,
        content: &[u8],
    ) -> Result<UploadReceipt, UploadError> {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![Ok(content.to_vec())];
        self.service
            .submit_upload(filename, target_language, stream::iter(chunks))
            .await
    }

    /// Polls until the job is terminal, recording every progress value seen.
    pub async fn wait_terminal(&self, job_id: &str) -> (JobRecord, Vec<u8>) {
        let mut seen = Vec::new();
        let record = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let record = self.service.status(job_id).expect("job should exist");
                seen.push(record.progress);
                if record.status.is_terminal() {
                    return record;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state");
        (record, seen)
    }

    /// Stops the pool and flushes, like a graceful server shutdown.
    pub async fn stop(self) {
        self.pool.shutdown().await;
        self.store.flush_pending();
    }
}

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod retention;
pub mod sanitize;
pub mod stages;
pub mod store;
pub mod worker;

pub use config::{load_config, resolve_config, Config, TranscriptFallback};
pub use db::{Database, DatabaseError};
pub use dispatch::{Download, DubbingService, PoolHealth, UploadReceipt};
pub use error::{ConfigError, JobError, UploadError, WorkerError};
pub use job::{JobRecord, JobStatus, JobUpdate};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
pub use retention::{spawn_maintenance, RetentionSweeper};
pub use stages::{StageError, Stages};
pub use store::JobStore;
pub use worker::WorkerPool;

pub mod config;
pub mod context;
pub mod error;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{job_work_dir, PipelineContext};
pub use error::{PipelineError, Stage};
pub use runner::{Pipeline, FALLBACK_MESSAGE};

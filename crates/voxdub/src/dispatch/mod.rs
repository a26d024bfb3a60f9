//! Request-level operations shared by the HTTP handlers.

pub mod service;
pub mod upload;

pub use service::{
    Download, DubbingService, PoolHealth, UploadReceipt, ACCEPTED_MESSAGE, BUSY_MESSAGE,
    MAX_RECENT_JOBS,
};
pub use upload::{validate, ValidatedUpload};

//! Job records and their lifecycle rules.

mod record;
mod status;

pub use record::{JobRecord, JobUpdate, UPLOADED_MESSAGE};
pub(crate) use record::{format_timestamp, parse_timestamp};
pub use status::{JobStatus, UnknownStatus};

/// Generates a fresh job identifier.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

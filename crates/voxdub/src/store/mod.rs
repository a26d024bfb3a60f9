mod job_store;

pub use job_store::{JobCounts, JobStore, INTERRUPTED_MESSAGE};

pub mod pool;

pub use pool::{WorkerPool, CANCELLED_MESSAGE, UNEXPECTED_ERROR_MESSAGE};

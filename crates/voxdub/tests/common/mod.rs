//! Shared test utilities for voxdub integration tests.
//!
//! - `TestHarness` for an isolated data directory and database
//! - `fakes` for in-process stage implementations
//! - `ConfigBuilder` for test configurations

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::ConfigBuilder;
pub use fakes::{CopyExtractor, FakeStages, FakeTranscriber};
pub use harness::{RunningService, TestHarness};

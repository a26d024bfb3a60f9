#![allow(dead_code)]

use std::path::PathBuf;

use voxdub::config::{Config, TranscriptFallback};

/// Builder for test `Config`s: small pool, short timeouts.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.worker.count = 2;
        config.worker.queue_capacity = 8;
        config.pipeline.stage_timeout_secs = 5;
        Self { config }
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.data_dir = Some(dir);
        self
    }

    pub fn workers(mut self, count: usize, queue_capacity: usize) -> Self {
        self.config.worker.count = count;
        self.config.worker.queue_capacity = queue_capacity;
        self
    }

    pub fn stage_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pipeline.stage_timeout_secs = secs;
        self
    }

    pub fn placeholder_on_failure(mut self) -> Self {
        self.config.pipeline.on_transcription_failure = TranscriptFallback::Placeholder;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

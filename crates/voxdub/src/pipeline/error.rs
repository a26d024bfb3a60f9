use std::fmt;

use thiserror::Error;

use crate::error::JobError;
use crate::job::JobStatus;
use crate::stages::StageError;

/// The five dependent steps of a dubbing run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AudioExtraction,
    Transcription,
    Translation,
    SpeechSynthesis,
    VideoMerge,
}

impl Stage {
    /// Status a job holds while this stage runs.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::AudioExtraction => JobStatus::ExtractingAudio,
            Self::Transcription => JobStatus::Transcribing,
            Self::Translation => JobStatus::Translating,
            Self::SpeechSynthesis => JobStatus::GeneratingSpeech,
            Self::VideoMerge => JobStatus::Merging,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AudioExtraction => "Audio extraction",
            Self::Transcription => "Transcription",
            Self::Translation => "Translation",
            Self::SpeechSynthesis => "Speech synthesis",
            Self::VideoMerge => "Video merge",
        })
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    StageFailure {
        stage: Stage,
        #[source]
        source: StageError,
    },

    #[error("Job store error: {0}")]
    Store(#[from] JobError),
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailure { stage, .. } => Some(*stage),
            Self::Store(_) => None,
        }
    }
}

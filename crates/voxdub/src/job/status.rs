use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a dubbing job, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    ExtractingAudio,
    Transcribing,
    Translating,
    GeneratingSpeech,
    Merging,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::ExtractingAudio => "extracting_audio",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::GeneratingSpeech => "generating_speech",
            Self::Merging => "merging",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Progress value recorded when a job enters this status.
    pub fn checkpoint(&self) -> u8 {
        match self {
            Self::Uploaded => 0,
            Self::ExtractingAudio => 10,
            Self::Transcribing => 30,
            Self::Translating => 50,
            Self::GeneratingSpeech => 70,
            Self::Merging => 85,
            Self::Completed => 100,
            Self::Error => 0,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Uploaded => 0,
            Self::ExtractingAudio => 1,
            Self::Transcribing => 2,
            Self::Translating => 3,
            Self::GeneratingSpeech => 4,
            Self::Merging => 5,
            Self::Completed => 6,
            Self::Error => 7,
        }
    }

    /// Whether a record in `self` may move to `next`.
    ///
    /// Terminal states accept nothing. `Error` is reachable from every other
    /// state. Otherwise the status may stay put (progress bumps) or advance.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Self::Error || next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown job status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "extracting_audio" => Ok(Self::ExtractingAudio),
            "transcribing" => Ok(Self::Transcribing),
            "translating" => Ok(Self::Translating),
            "generating_speech" => Ok(Self::GeneratingSpeech),
            "merging" => Ok(Self::Merging),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

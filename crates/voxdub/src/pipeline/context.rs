use std::path::{Path, PathBuf};

use crate::job::JobRecord;

pub const EXTRACTED_AUDIO: &str = "extracted_audio.wav";
pub const TRANSLATED_AUDIO: &str = "translated_audio.wav";

/// Working state for one pipeline run.
pub struct PipelineContext {
    // Latest record as returned by the store
    pub job: JobRecord,

    // processed/{id}
    pub work_dir: PathBuf,
    pub extracted_audio: PathBuf,
    pub speech_audio: PathBuf,
    pub output_path: PathBuf,

    // Transcription result, or the placeholder text
    pub transcript: Option<String>,
    pub source_language: Option<String>,
    pub transcript_fallback: bool,

    // Translation result
    pub translated_text: Option<String>,
}

impl PipelineContext {
    pub fn new(job: JobRecord, processed_dir: &Path) -> Self {
        let work_dir = job_work_dir(processed_dir, &job.id);
        Self {
            extracted_audio: work_dir.join(EXTRACTED_AUDIO),
            speech_audio: work_dir.join(TRANSLATED_AUDIO),
            output_path: work_dir.join(format!("dubbed_{}", job.filename)),
            work_dir,
            job,
            transcript: None,
            source_language: None,
            transcript_fallback: false,
            translated_text: None,
        }
    }
}

/// `processed/{id}`: every intermediate and final artifact of a job.
pub fn job_work_dir(processed_dir: &Path, job_id: &str) -> PathBuf {
    processed_dir.join(job_id)
}

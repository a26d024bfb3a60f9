use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::TranscriptFallback;
use crate::job::{JobRecord, JobUpdate};
use crate::sanitize;
use crate::stages::{command, StageError, Stages};
use crate::store::JobStore;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::{PipelineError, Stage};

pub const FALLBACK_MESSAGE: &str = "Using sample text (transcription failed)";

/// Runs the five dubbing stages for one job, recording progress in the
/// job store as it goes.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    stages: Stages,
    store: Arc<JobStore>,
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, stages: Stages, store: Arc<JobStore>) -> Self {
        Self {
            config,
            stages,
            store,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Runs the job to a terminal state and returns the final record.
    ///
    /// A stage failure is not an `Err`: it is written to the record as
    /// `error` and returned. `Err` means the store itself could not be
    /// read or updated.
    pub async fn run(&self, job_id: &str) -> Result<JobRecord, PipelineError> {
        let job = self.store.get(job_id)?;
        let span = info_span!("pipeline",
            job_id = %job.id,
            filename = %sanitize::redact_path(&job.original_path),
            target_language = %job.target_language,
        );

        let mut ctx = PipelineContext::new(job, &self.config.processed_dir);
        match self.run_stages(&mut ctx).instrument(span.clone()).await {
            Ok(record) => Ok(record),
            Err(e) => {
                span.in_scope(|| warn!(error = %e, stage = ?e.stage(), "Pipeline halted"));
                Ok(self
                    .store
                    .update_async(job_id, JobUpdate::failed(e.to_string()))
                    .await?)
            }
        }
    }

    /// Marks a job that will never run as failed.
    pub async fn fail(&self, job_id: &str, message: &str) -> Result<JobRecord, PipelineError> {
        Ok(self
            .store
            .update_async(job_id, JobUpdate::failed(message))
            .await?)
    }

    async fn run_stages(&self, ctx: &mut PipelineContext) -> Result<JobRecord, PipelineError> {
        // Step 1: Extract audio
        {
            self.enter(ctx, Stage::AudioExtraction, "Extracting audio from video...")?;
            let extractor = Arc::clone(&self.stages.extractor);
            let (video, work_dir, audio) = (
                ctx.job.original_path.clone(),
                ctx.work_dir.clone(),
                ctx.extracted_audio.clone(),
            );
            self.bounded(Stage::AudioExtraction, async move {
                tokio::fs::create_dir_all(&work_dir)
                    .await
                    .map_err(|e| StageError::Io {
                        path: work_dir.clone(),
                        source: e,
                    })?;
                extractor.extract(&video, &audio).await?;
                command::ensure_output(&audio).await
            })
            .instrument(info_span!("extract_audio"))
            .await?;
            self.advance(ctx, JobUpdate::progress(20, "Audio extracted"))?;
        }

        // Step 2: Transcribe
        {
            self.enter(ctx, Stage::Transcription, "Transcribing audio...")?;
            self.step_transcribe(ctx)
                .instrument(info_span!("transcribe"))
                .await?;
        }

        // Step 3: Translate
        {
            self.enter(ctx, Stage::Translation, "Translating text...")?;
            let text = ctx.transcript.clone().unwrap_or_default();
            let source = self.translation_source(ctx);
            let target = ctx.job.target_language.clone();
            let translated = self
                .bounded(
                    Stage::Translation,
                    self.stages
                        .translator
                        .translate(&text, source.as_deref(), &target),
                )
                .instrument(info_span!("translate", source = source.as_deref().unwrap_or("auto")))
                .await?;
            debug!(chars = translated.len(), "Translated text received");
            ctx.translated_text = Some(translated);
            self.advance(ctx, JobUpdate::progress(65, "Translation completed"))?;
        }

        // Step 4: Synthesize speech
        {
            self.enter(ctx, Stage::SpeechSynthesis, "Generating speech...")?;
            let text = ctx.translated_text.clone().unwrap_or_default();
            let language = ctx.job.target_language.clone();
            let synthesizer = Arc::clone(&self.stages.synthesizer);
            let audio = ctx.speech_audio.clone();
            self.bounded(Stage::SpeechSynthesis, async move {
                synthesizer.synthesize(&text, &language, &audio).await?;
                command::ensure_output(&audio).await
            })
            .instrument(info_span!("synthesize"))
            .await?;
            self.advance(ctx, JobUpdate::progress(80, "Speech generated"))?;
        }

        // Step 5: Merge
        {
            self.enter(ctx, Stage::VideoMerge, "Merging audio with video...")?;
            let merger = Arc::clone(&self.stages.merger);
            let (video, audio, out) = (
                ctx.job.original_path.clone(),
                ctx.speech_audio.clone(),
                ctx.output_path.clone(),
            );
            self.bounded(Stage::VideoMerge, async move {
                merger.merge(&video, &audio, &out).await?;
                command::ensure_output(&out).await
            })
            .instrument(info_span!("merge"))
            .await?;
            self.advance(ctx, JobUpdate::progress(90, "Video merged"))?;
        }

        let record = self
            .store
            .update_async(
                &ctx.job.id,
                JobUpdate::completed(ctx.output_path.clone(), "Video dubbing completed!"),
            )
            .await?;
        info!(fallback = ctx.transcript_fallback, "Dubbing completed");
        Ok(record)
    }

    async fn step_transcribe(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let hint = self.config.language_hint.clone();
        let result = self
            .bounded(
                Stage::Transcription,
                self.stages
                    .transcriber
                    .transcribe(&ctx.extracted_audio, hint.as_deref()),
            )
            .await;

        let failure = match result {
            Ok(transcript) if !transcript.text.trim().is_empty() => {
                debug!(chars = transcript.text.len(), "Transcript received");
                let mut update = JobUpdate::progress(45, "Transcription completed");
                if let Some(language) = &transcript.language {
                    update = update.with_source_language(language.clone());
                }
                ctx.source_language = transcript.language;
                ctx.transcript = Some(transcript.text);
                self.advance(ctx, update)?;
                return Ok(());
            }
            Ok(_) => PipelineError::StageFailure {
                stage: Stage::Transcription,
                source: StageError::EmptyResponse {
                    service: "speech recognition",
                },
            },
            Err(e) => e,
        };

        match self.config.on_transcription_failure {
            TranscriptFallback::Fail => Err(failure),
            TranscriptFallback::Placeholder => {
                warn!(error = %failure, "Continuing with placeholder text");
                ctx.transcript = Some(self.config.placeholder_text.clone());
                ctx.transcript_fallback = true;
                self.advance(
                    ctx,
                    JobUpdate::progress(45, FALLBACK_MESSAGE)
                        .with_extra("transcript_fallback", Value::Bool(true)),
                )
            }
        }
    }

    /// Detected language if it is usable as a code, else the configured
    /// hint, else auto-detect.
    fn translation_source(&self, ctx: &PipelineContext) -> Option<String> {
        if ctx.transcript_fallback {
            return None;
        }
        ctx.source_language
            .clone()
            .filter(|l| sanitize::is_valid_language(l))
            .or_else(|| self.config.language_hint.clone())
    }

    fn enter(&self, ctx: &mut PipelineContext, stage: Stage, message: &str) -> Result<(), PipelineError> {
        debug!(status = %stage.status(), "Entering stage");
        ctx.job = self
            .store
            .update(&ctx.job.id, JobUpdate::stage(stage.status(), message))?;
        Ok(())
    }

    fn advance(&self, ctx: &mut PipelineContext, update: JobUpdate) -> Result<(), PipelineError> {
        ctx.job = self.store.update(&ctx.job.id, update)?;
        Ok(())
    }

    /// Applies the stage timeout and tags any failure with its stage.
    async fn bounded<T, F>(&self, stage: Stage, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, StageError>>,
    {
        let limit = self.config.stage_timeout;
        let result = match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StageError::Timeout(limit.as_secs())),
        };
        result.map_err(|source| PipelineError::StageFailure { stage, source })
    }
}

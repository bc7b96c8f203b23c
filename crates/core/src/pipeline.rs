//! Runs validate, extract, transcribe and summarize in order and turns
//! whatever happens into a [`PipelineOutcome`].
//!
//! Validation and extraction failures end the run immediately. A
//! transcription failure also ends it, but only after the extractor has been
//! told to clean up. Summarization and cleanup failures are reported as
//! warnings and never change the outcome.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::{
    artifacts::{get_summary_path, get_transcription_path, save_summary, save_transcription},
    audio::{AudioExtractor, FfmpegExtractor},
    config::Config,
    error::{Result, VidscribeError},
    progress::{NoProgress, Progress, Stage},
    summarize::{ChatSummarizer, Summarizer},
    transcription::{Transcriber, WhisperTranscriber},
    types::{PipelineOutcome, PipelineRequest, PipelineSuccess, Summary, Transcription},
    validate::{validate_api_key, validate_output_dir, validate_video_file},
};

/// A fatal error together with the wording that prefixes it in the outcome.
struct StageFailure {
    stage: Stage,
    context: &'static str,
    error: VidscribeError,
}

impl StageFailure {
    fn new(stage: Stage, context: &'static str, error: impl Into<VidscribeError>) -> Self {
        Self {
            stage,
            context,
            error: error.into(),
        }
    }

    fn message(&self) -> String {
        format!("{}: {}", self.context, self.error.reason())
    }
}

const SUMMARY_CONTEXT: &str = "Summary generation failed";
const CLEANUP_CONTEXT: &str = "Failed to clean up temporary files";

pub struct Pipeline<E, T, S> {
    config: Config,
    extractor: E,
    transcriber: T,
    summarizer: S,
    progress: Box<dyn Progress>,
}

impl Pipeline<FfmpegExtractor, WhisperTranscriber, ChatSummarizer> {
    /// ffmpeg extraction, local whisper and the configured chat provider.
    pub fn from_config(config: Config) -> Result<Self> {
        let extractor = FfmpegExtractor::from_config(&config);
        let transcriber = WhisperTranscriber::from_config(&config);
        let summarizer = ChatSummarizer::from_config(&config)?;
        Ok(Self::new(config, extractor, transcriber, summarizer))
    }
}

impl<E, T, S> Pipeline<E, T, S>
where
    E: AudioExtractor,
    T: Transcriber,
    S: Summarizer,
{
    pub fn new(config: Config, extractor: E, transcriber: T, summarizer: S) -> Self {
        Self {
            config,
            extractor,
            transcriber,
            summarizer,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn transcriber(&self) -> &T {
        &self.transcriber
    }

    pub fn summarizer(&self) -> &S {
        &self.summarizer
    }

    /// Run every stage once. Never fails: fatal errors are folded into
    /// [`PipelineOutcome::Failure`].
    pub async fn run(&mut self, request: &PipelineRequest) -> PipelineOutcome {
        info!("Processing video: {}", request.video_path.display());

        match self.execute(request).await {
            Ok(success) => {
                info!(
                    "Pipeline completed: {}",
                    success.transcription_file.display()
                );
                PipelineOutcome::Success(success)
            }
            Err(failure) => {
                let message = failure.message();
                error!("Pipeline failed at {}: {}", failure.stage.label(), message);
                self.progress.stage_failed(failure.stage, &message);
                PipelineOutcome::Failure {
                    video_file: request.video_path.clone(),
                    error: message,
                }
            }
        }
    }

    async fn execute(
        &mut self,
        request: &PipelineRequest,
    ) -> std::result::Result<PipelineSuccess, StageFailure> {
        // Validate
        self.progress.stage_started(Stage::Validate);
        let video = validate_video_file(&request.video_path, &self.config.allowed_extensions)
            .map_err(|e| StageFailure::new(Stage::Validate, "Invalid video file", e))?;
        validate_output_dir(&request.output_dir)
            .map_err(|e| StageFailure::new(Stage::Validate, "Invalid output directory", e))?;
        self.progress
            .stage_finished(Stage::Validate, &format!("Video validated: {}", video.filename));

        // Extract
        self.progress.stage_started(Stage::Extract);
        let audio_path = self
            .extractor
            .extract(&request.video_path)
            .await
            .map_err(|e| StageFailure::new(Stage::Extract, "Audio extraction failed", e))?;
        info!("Audio extracted: {}", audio_path.display());
        self.progress.stage_finished(Stage::Extract, "Audio extracted");

        // Transcribe, then release the audio whatever the result was
        self.progress.stage_started(Stage::Transcribe);
        let transcribed = self
            .transcribe_and_save(&audio_path, request, &video.stem())
            .await;
        let released = self.release_audio().await;
        let (transcription, transcription_file) = transcribed
            .map_err(|e| StageFailure::new(Stage::Transcribe, "Transcription failed", e))?;
        released?;
        self.progress.stage_finished(
            Stage::Transcribe,
            &format!(
                "Transcribed: {} words, {}",
                transcription.word_count(),
                transcription.language
            ),
        );

        // Summarize (best effort)
        let summary_file = match request.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(api_key) => {
                self.progress.stage_started(Stage::Summarize);
                match self
                    .summarize_and_save(&transcription, api_key, &request.output_dir, &video.stem())
                    .await
                    .map_err(VidscribeError::into_summarization)
                {
                    Ok((summary, path)) => {
                        self.progress.stage_finished(
                            Stage::Summarize,
                            &format!(
                                "Summary generated: {:.1}% compression",
                                summary.compression_ratio() * 100.0
                            ),
                        );
                        Some(path)
                    }
                    Err(e) => {
                        self.settle(Stage::Summarize, SUMMARY_CONTEXT, e)?;
                        self.progress.info("Continuing with transcription only...");
                        None
                    }
                }
            }
            None => {
                info!("No API key provided, skipping summary generation");
                self.progress
                    .info("No API key provided. Skipping summary generation.");
                None
            }
        };

        Ok(PipelineSuccess {
            video_file: request.video_path.clone(),
            transcription_file,
            word_count: transcription.word_count(),
            confidence: transcription.confidence,
            summary_file,
            output_dir: request.output_dir.clone(),
        })
    }

    async fn transcribe_and_save(
        &mut self,
        audio_path: &Path,
        request: &PipelineRequest,
        stem: &str,
    ) -> Result<(Transcription, PathBuf)> {
        let transcription = self
            .transcriber
            .transcribe(audio_path, request.language.as_deref())
            .await?;

        if transcription.text.trim().is_empty() {
            return Err(VidscribeError::TranscriptionFailed {
                audio_path: audio_path.to_path_buf(),
                reason: "No speech detected in audio file".to_string(),
            });
        }

        let path = get_transcription_path(&request.output_dir, stem);
        save_transcription(&transcription, &path)
            .await
            .map_err(|e| VidscribeError::TranscriptionFailed {
                audio_path: audio_path.to_path_buf(),
                reason: format!("could not save transcript to {}: {}", path.display(), e),
            })?;
        info!("Transcription saved: {}", path.display());

        Ok((transcription, path))
    }

    async fn release_audio(&mut self) -> std::result::Result<(), StageFailure> {
        match self.extractor.cleanup().await {
            Ok(()) => {
                info!("Temporary audio files cleaned up");
                Ok(())
            }
            Err(e) => self.settle(Stage::Cleanup, CLEANUP_CONTEXT, e.into_cleanup()),
        }
    }

    /// Fatal errors end the run; the rest are reported as warnings.
    fn settle(
        &self,
        stage: Stage,
        context: &'static str,
        error: VidscribeError,
    ) -> std::result::Result<(), StageFailure> {
        if error.kind().is_fatal() {
            return Err(StageFailure::new(stage, context, error));
        }
        let message = format!("{}: {}", context, error.reason());
        warn!("{}", message);
        self.progress.warning(stage, &message);
        Ok(())
    }

    async fn summarize_and_save(
        &mut self,
        transcription: &Transcription,
        api_key: &str,
        output_dir: &Path,
        stem: &str,
    ) -> Result<(Summary, PathBuf)> {
        validate_api_key(api_key, self.config.min_api_key_len)?;

        let text = self
            .summarizer
            .summarize(&transcription.text, api_key)
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| VidscribeError::SummarizationFailed {
                reason: "Summary generation returned empty result".to_string(),
            })?;

        let summary = Summary::new(text, &transcription.text);
        let path = get_summary_path(output_dir, stem);
        save_summary(&summary, &path).await?;
        info!("Summary saved: {}", path.display());

        Ok((summary, path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Extract,
    Transcribe,
    Summarize,
    Cleanup,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Transcribe => "transcribe",
            Stage::Summarize => "summarize",
            Stage::Cleanup => "cleanup",
        }
    }

    /// Text shown while the stage is running.
    pub fn activity(self) -> &'static str {
        match self {
            Stage::Validate => "Validating input...",
            Stage::Extract => "Extracting audio...",
            Stage::Transcribe => "Transcribing with Whisper...",
            Stage::Summarize => "Generating summary...",
            Stage::Cleanup => "Removing temporary files...",
        }
    }
}

/// Receives stage-by-stage notifications from the pipeline. Every method
/// defaults to doing nothing.
pub trait Progress: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _detail: &str) {}
    fn stage_failed(&self, _stage: Stage, _message: &str) {}
    fn warning(&self, _stage: Stage, _message: &str) {}
    fn info(&self, _message: &str) {}
}

pub struct NoProgress;

impl Progress for NoProgress {}

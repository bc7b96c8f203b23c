use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationError;

#[derive(Error, Debug)]
pub enum VidscribeError {
    #[error("{reason}")]
    InvalidInput { reason: String },

    #[error("Audio extraction failed for {video_path}: {reason}")]
    ExtractionFailed { video_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptionFailed { audio_path: PathBuf, reason: String },

    #[error("Summary generation failed: {reason}")]
    SummarizationFailed { reason: String },

    #[error("Failed to clean up temporary files: {}", failures.join("; "))]
    CleanupFailed { failures: Vec<String> },

    #[error("Model download failed for {url}: {reason}")]
    ModelDownloadFailed { url: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    ConfigFailed { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, VidscribeError>;

/// Coarse classification used by the pipeline to decide whether a failure
/// aborts the run or is demoted to a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    ExtractionFailure,
    TranscriptionFailure,
    SummarizationFailure,
    CleanupFailure,
    Internal,
}

impl ErrorKind {
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            ErrorKind::SummarizationFailure | ErrorKind::CleanupFailure
        )
    }
}

impl VidscribeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VidscribeError::InvalidInput { .. } => ErrorKind::InvalidInput,
            VidscribeError::ExtractionFailed { .. } => ErrorKind::ExtractionFailure,
            VidscribeError::TranscriptionFailed { .. }
            | VidscribeError::ModelDownloadFailed { .. } => ErrorKind::TranscriptionFailure,
            VidscribeError::SummarizationFailed { .. } => ErrorKind::SummarizationFailure,
            VidscribeError::CleanupFailed { .. } => ErrorKind::CleanupFailure,
            VidscribeError::ConfigFailed { .. }
            | VidscribeError::IoError(_)
            | VidscribeError::JsonError(_)
            | VidscribeError::ApiError(_) => ErrorKind::Internal,
        }
    }

    /// The underlying cause without the stage wording of the display impl.
    pub fn reason(&self) -> String {
        match self {
            VidscribeError::InvalidInput { reason }
            | VidscribeError::ExtractionFailed { reason, .. }
            | VidscribeError::TranscriptionFailed { reason, .. }
            | VidscribeError::SummarizationFailed { reason } => reason.clone(),
            VidscribeError::CleanupFailed { failures } => failures.join("; "),
            other => other.to_string(),
        }
    }

    /// Anything raised while producing or saving a summary is a summary failure.
    pub fn into_summarization(self) -> Self {
        match self {
            err @ VidscribeError::SummarizationFailed { .. } => err,
            other => VidscribeError::SummarizationFailed {
                reason: other.reason(),
            },
        }
    }

    /// Anything raised while removing temporary files is a cleanup failure.
    pub fn into_cleanup(self) -> Self {
        match self {
            err @ VidscribeError::CleanupFailed { .. } => err,
            other => VidscribeError::CleanupFailed {
                failures: vec![other.to_string()],
            },
        }
    }
}

impl From<ValidationError> for VidscribeError {
    fn from(err: ValidationError) -> Self {
        VidscribeError::InvalidInput {
            reason: err.to_string(),
        }
    }
}

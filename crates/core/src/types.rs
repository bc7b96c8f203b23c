use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Output of the speech recognition stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub confidence: f32,
    pub language: String,
    pub created_at: DateTime<Local>,
}

impl Transcription {
    pub fn new(text: impl Into<String>, confidence: f32, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence,
            language: language.into(),
            created_at: Local::now(),
        }
    }

    /// Number of whitespace separated tokens in the text.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    /// Character count of the text the summary was generated from.
    pub original_length: usize,
    pub created_at: DateTime<Local>,
}

impl Summary {
    pub fn new(text: impl Into<String>, original_text: &str) -> Self {
        Self {
            text: text.into(),
            original_length: original_text.chars().count(),
            created_at: Local::now(),
        }
    }

    pub fn summary_length(&self) -> usize {
        self.text.chars().count()
    }

    /// `summary_length / original_length`, or 0.0 for an empty original.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_length == 0 {
            return 0.0;
        }
        self.summary_length() as f64 / self.original_length as f64
    }
}

/// One invocation of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub video_path: PathBuf,
    pub output_dir: PathBuf,
    pub api_key: Option<String>,
    pub language: Option<String>,
}

impl PipelineRequest {
    pub fn new(video_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            output_dir: output_dir.into(),
            api_key: None,
            language: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSuccess {
    pub video_file: PathBuf,
    pub transcription_file: PathBuf,
    pub word_count: usize,
    pub confidence: f32,
    pub summary_file: Option<PathBuf>,
    pub output_dir: PathBuf,
}

/// The only thing [`crate::pipeline::Pipeline::run`] hands back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success(PipelineSuccess),
    Failure { video_file: PathBuf, error: String },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    pub fn video_file(&self) -> &PathBuf {
        match self {
            PipelineOutcome::Success(s) => &s.video_file,
            PipelineOutcome::Failure { video_file, .. } => video_file,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

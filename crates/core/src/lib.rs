//! Vidscribe Core Library
//!
//! Turns a local video into a transcript with local Whisper and, when a
//! credential is available, an AI-generated summary.

pub mod artifacts;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod summarize;
pub mod transcription;
pub mod types;
pub mod validate;

// Re-export commonly used items at crate root
pub use artifacts::{
    format_summary, format_transcription, get_summary_path, get_transcription_path,
    save_summary, save_transcription,
};
pub use audio::{AudioExtractor, FfmpegExtractor, MediaInfo, probe_media};
pub use config::{Config, SummaryLength};
pub use error::{ErrorKind, Result, VidscribeError};
pub use pipeline::Pipeline;
pub use progress::{NoProgress, Progress, Stage};
pub use provider::{Provider, ProviderConfig};
pub use summarize::{ChatSummarizer, Summarizer};
pub use transcription::{Transcriber, WhisperTranscriber, silence_whisper_logs};
pub use types::{PipelineOutcome, PipelineRequest, PipelineSuccess, Summary, Transcription};
pub use validate::{ValidationError, VideoFile};

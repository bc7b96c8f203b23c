use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tempfile::TempDir;
use vidscribe_core::{
    AudioExtractor, Config, PipelineOutcome, PipelineRequest, PipelineSuccess, Progress, Result,
    Stage, Summarizer, Transcriber, Transcription, VidscribeError,
};

type Pipeline = vidscribe_core::Pipeline<MockExtractor, MockTranscriber, MockSummarizer>;

struct MockExtractor {
    temp_dir: PathBuf,
    fail_with: Option<String>,
    fail_cleanup: bool,
    temp_files: Vec<PathBuf>,
    extract_calls: usize,
    cleanup_calls: usize,
}

impl MockExtractor {
    fn new(temp_dir: &Path) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            fail_with: None,
            fail_cleanup: false,
            temp_files: Vec::new(),
            extract_calls: 0,
            cleanup_calls: 0,
        }
    }
}

#[async_trait]
impl AudioExtractor for MockExtractor {
    async fn extract(&mut self, video_path: &Path) -> Result<PathBuf> {
        self.extract_calls += 1;
        if let Some(reason) = &self.fail_with {
            return Err(VidscribeError::ExtractionFailed {
                video_path: video_path.to_path_buf(),
                reason: reason.clone(),
            });
        }
        std::fs::create_dir_all(&self.temp_dir)?;
        let audio = self.temp_dir.join("demo_audio.wav");
        std::fs::write(&audio, b"RIFF")?;
        self.temp_files.push(audio.clone());
        Ok(audio)
    }

    async fn cleanup(&mut self) -> Result<()> {
        self.cleanup_calls += 1;
        if self.fail_cleanup {
            let failures = self
                .temp_files
                .drain(..)
                .map(|p| format!("{}: permission denied", p.display()))
                .collect();
            return Err(VidscribeError::CleanupFailed { failures });
        }
        for path in self.temp_files.drain(..) {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }
}

struct MockTranscriber {
    result: std::result::Result<String, String>,
    seen_audio: Option<PathBuf>,
    seen_language: Option<String>,
    calls: usize,
}

impl MockTranscriber {
    fn returning(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
            seen_audio: None,
            seen_language: None,
            calls: 0,
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            ..Self::returning("")
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &mut self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<Transcription> {
        self.calls += 1;
        self.seen_audio = Some(audio_path.to_path_buf());
        self.seen_language = language.map(str::to_string);
        match &self.result {
            Ok(text) => Ok(Transcription::new(text.clone(), 0.87, "en")),
            Err(reason) => Err(VidscribeError::TranscriptionFailed {
                audio_path: audio_path.to_path_buf(),
                reason: reason.clone(),
            }),
        }
    }
}

enum SummaryBehaviour {
    Text(String),
    Declines,
    Errors,
}

struct MockSummarizer {
    behaviour: SummaryBehaviour,
    calls: usize,
}

impl MockSummarizer {
    fn new(behaviour: SummaryBehaviour) -> Self {
        Self { behaviour, calls: 0 }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&mut self, _text: &str, _api_key: &str) -> Result<Option<String>> {
        self.calls += 1;
        match &self.behaviour {
            SummaryBehaviour::Text(text) => Ok(Some(text.clone())),
            SummaryBehaviour::Declines => Ok(None),
            SummaryBehaviour::Errors => Err(VidscribeError::SummarizationFailed {
                reason: "connection reset".into(),
            }),
        }
    }
}

#[derive(Clone, Default)]
struct RecordingProgress {
    warnings: Arc<Mutex<Vec<(Stage, String)>>>,
    failures: Arc<Mutex<Vec<(Stage, String)>>>,
}

impl Progress for RecordingProgress {
    fn stage_failed(&self, stage: Stage, message: &str) {
        self.failures.lock().unwrap().push((stage, message.to_string()));
    }

    fn warning(&self, stage: Stage, message: &str) {
        self.warnings.lock().unwrap().push((stage, message.to_string()));
    }
}

struct Fixture {
    dir: TempDir,
    video: PathBuf,
    out: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("demo.mp4");
        std::fs::write(&video, vec![7u8; 500]).unwrap();
        let out = dir.path().join("out");
        Self { dir, video, out }
    }

    fn request(&self) -> PipelineRequest {
        PipelineRequest::new(&self.video, &self.out)
    }

    fn pipeline(&self, transcriber: MockTranscriber, summarizer: MockSummarizer) -> Pipeline {
        let extractor = MockExtractor::new(&self.dir.path().join("temp"));
        vidscribe_core::Pipeline::new(Config::default(), extractor, transcriber, summarizer)
    }
}

fn success(outcome: PipelineOutcome) -> PipelineSuccess {
    match outcome {
        PipelineOutcome::Success(s) => s,
        PipelineOutcome::Failure { error, .. } => panic!("expected success, got: {error}"),
    }
}

fn failure(outcome: PipelineOutcome) -> String {
    match outcome {
        PipelineOutcome::Failure { error, .. } => error,
        PipelineOutcome::Success(s) => panic!("expected failure, got: {s:?}"),
    }
}

#[tokio::test]
async fn transcript_only_without_credential() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("Hello from the demo video"),
        MockSummarizer::new(SummaryBehaviour::Text("never used".into())),
    );

    let result = success(pipeline.run(&fx.request()).await);

    assert_eq!(result.transcription_file, fx.out.join("demo_transcription.txt"));
    assert_eq!(result.summary_file, None);
    assert_eq!(result.word_count, 5);
    assert!((result.confidence - 0.87).abs() < 1e-6);
    assert_eq!(result.output_dir, fx.out);
    assert_eq!(result.video_file, fx.video);

    let written = std::fs::read_to_string(&result.transcription_file).unwrap();
    assert!(written.ends_with("Hello from the demo video"));
    assert!(written.contains("Language: en\n"));

    assert_eq!(pipeline.summarizer().calls, 0);
    assert_eq!(pipeline.extractor().cleanup_calls, 1);
    assert!(pipeline.extractor().temp_files.is_empty());
    assert!(!fx.out.join("demo_summary.txt").exists());
}

#[tokio::test]
async fn summary_is_written_with_compression_ratio() {
    let fx = Fixture::new();
    let transcript = "word ".repeat(200);
    assert_eq!(transcript.len(), 1000);
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning(&transcript),
        MockSummarizer::new(SummaryBehaviour::Text("short summary".into())),
    );

    let request = fx.request().with_api_key("sk-test-credential");
    let result = success(pipeline.run(&request).await);

    let summary_file = result.summary_file.expect("summary artifact");
    assert_eq!(summary_file, fx.out.join("demo_summary.txt"));

    let written = std::fs::read_to_string(&summary_file).unwrap();
    assert!(written.contains("Original length: 1000 characters\n"));
    assert!(written.contains("Summary length: 13 characters\n"));
    assert!(written.contains("Compression ratio: 1.30%\n"));
    assert!(written.ends_with("short summary"));
    assert_eq!(pipeline.summarizer().calls, 1);
}

#[tokio::test]
async fn declined_summary_still_succeeds() {
    let fx = Fixture::new();
    let progress = RecordingProgress::default();
    let mut pipeline = fx
        .pipeline(
            MockTranscriber::returning("some words"),
            MockSummarizer::new(SummaryBehaviour::Declines),
        )
        .with_progress(progress.clone());

    let result = success(pipeline.run(&fx.request().with_api_key("sk-test-credential")).await);

    assert_eq!(result.summary_file, None);
    assert!(!fx.out.join("demo_summary.txt").exists());
    let warnings = progress.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, Stage::Summarize);
    assert!(warnings[0].1.contains("empty result"));
}

#[tokio::test]
async fn summarizer_error_is_not_fatal() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("some words"),
        MockSummarizer::new(SummaryBehaviour::Errors),
    );

    let result = success(pipeline.run(&fx.request().with_api_key("sk-test-credential")).await);

    assert_eq!(result.summary_file, None);
    assert_eq!(pipeline.summarizer().calls, 1);
}

#[tokio::test]
async fn short_credential_skips_summarizer_without_failing() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("some words"),
        MockSummarizer::new(SummaryBehaviour::Text("unused".into())),
    );

    let result = success(pipeline.run(&fx.request().with_api_key("sk-1")).await);

    assert_eq!(result.summary_file, None);
    assert_eq!(pipeline.summarizer().calls, 0);
}

#[tokio::test]
async fn empty_credential_counts_as_absent() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("some words"),
        MockSummarizer::new(SummaryBehaviour::Text("unused".into())),
    );

    let result = success(pipeline.run(&fx.request().with_api_key("")).await);

    assert_eq!(result.summary_file, None);
    assert_eq!(pipeline.summarizer().calls, 0);
}

#[tokio::test]
async fn transcription_failure_still_cleans_up_once() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::failing("No speech detected in audio file"),
        MockSummarizer::new(SummaryBehaviour::Text("unused".into())),
    );

    let error = failure(
        pipeline
            .run(&fx.request().with_api_key("sk-test-credential"))
            .await,
    );

    assert_eq!(error, "Transcription failed: No speech detected in audio file");
    assert_eq!(pipeline.extractor().cleanup_calls, 1);
    assert!(pipeline.extractor().temp_files.is_empty());
    assert_eq!(pipeline.summarizer().calls, 0);
    assert!(!fx.out.join("demo_transcription.txt").exists());
}

#[tokio::test]
async fn blank_transcript_is_a_failure() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("   "),
        MockSummarizer::new(SummaryBehaviour::Declines),
    );

    let error = failure(pipeline.run(&fx.request()).await);

    assert!(error.starts_with("Transcription failed"));
    assert_eq!(pipeline.extractor().cleanup_calls, 1);
}

#[tokio::test]
async fn unwritable_transcript_is_fatal() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.out.join("demo_transcription.txt")).unwrap();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("some words"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    );

    let error = failure(pipeline.run(&fx.request()).await);

    assert!(error.starts_with("Transcription failed: could not save transcript"));
    assert_eq!(pipeline.extractor().cleanup_calls, 1);
}

#[tokio::test]
async fn missing_video_stops_before_extraction() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("unused"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    );
    let request = PipelineRequest::new(fx.dir.path().join("nope.mp4"), &fx.out);

    let outcome = pipeline.run(&request).await;
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.video_file(), &fx.dir.path().join("nope.mp4"));

    let error = failure(outcome);
    assert!(error.starts_with("Invalid video file: File does not exist"));
    assert_eq!(pipeline.extractor().extract_calls, 0);
    assert_eq!(pipeline.extractor().cleanup_calls, 0);
    assert_eq!(pipeline.transcriber().calls, 0);
    assert!(!fx.out.exists());
}

#[tokio::test]
async fn unsupported_format_is_invalid_input() {
    let fx = Fixture::new();
    let clip = fx.dir.path().join("clip.mkv");
    std::fs::write(&clip, b"data").unwrap();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("unused"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    );

    let error = failure(pipeline.run(&PipelineRequest::new(&clip, &fx.out)).await);

    assert_eq!(
        error,
        "Invalid video file: Unsupported video format: .mkv. Supported formats: .mp4"
    );
}

#[tokio::test]
async fn configured_extensions_are_honoured() {
    let fx = Fixture::new();
    let clip = fx.dir.path().join("clip.mkv");
    std::fs::write(&clip, b"data").unwrap();
    let config = Config {
        allowed_extensions: vec!["mp4".into(), "mkv".into()],
        ..Config::default()
    };
    let mut pipeline = vidscribe_core::Pipeline::new(
        config,
        MockExtractor::new(&fx.dir.path().join("temp")),
        MockTranscriber::returning("mkv works too"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    );

    let result = success(pipeline.run(&PipelineRequest::new(&clip, &fx.out)).await);
    assert_eq!(result.transcription_file, fx.out.join("clip_transcription.txt"));
}

#[tokio::test]
async fn extraction_failure_skips_transcription() {
    let fx = Fixture::new();
    let progress = RecordingProgress::default();
    let mut extractor = MockExtractor::new(&fx.dir.path().join("temp"));
    extractor.fail_with = Some("ffmpeg not found on PATH".into());
    let mut pipeline = vidscribe_core::Pipeline::new(
        Config::default(),
        extractor,
        MockTranscriber::returning("unused"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    )
    .with_progress(progress.clone());

    let error = failure(pipeline.run(&fx.request()).await);

    assert_eq!(error, "Audio extraction failed: ffmpeg not found on PATH");
    assert_eq!(pipeline.transcriber().calls, 0);
    assert_eq!(pipeline.extractor().temp_files.len(), 0);
    assert_eq!(pipeline.extractor().cleanup_calls, 0);
    assert!(!fx.out.join("demo_transcription.txt").exists());
    let failures = progress.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::Extract);
}

#[tokio::test]
async fn cleanup_failure_is_only_a_warning() {
    let fx = Fixture::new();
    let progress = RecordingProgress::default();
    let mut extractor = MockExtractor::new(&fx.dir.path().join("temp"));
    extractor.fail_cleanup = true;
    let mut pipeline = vidscribe_core::Pipeline::new(
        Config::default(),
        extractor,
        MockTranscriber::returning("some words"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    )
    .with_progress(progress.clone());

    let outcome = pipeline.run(&fx.request()).await;

    assert!(outcome.is_success());
    let warnings = progress.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, Stage::Cleanup);
    assert!(warnings[0].1.starts_with("Failed to clean up temporary files"));
}

#[tokio::test]
async fn language_hint_reaches_transcriber() {
    let fx = Fixture::new();
    let mut pipeline = fx.pipeline(
        MockTranscriber::returning("hola"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    );

    success(pipeline.run(&fx.request().with_language("es-ES")).await);

    assert_eq!(pipeline.transcriber().seen_language.as_deref(), Some("es-ES"));
    assert_eq!(
        pipeline.transcriber().seen_audio.as_deref(),
        Some(fx.dir.path().join("temp").join("demo_audio.wav").as_path())
    );
}

#[tokio::test]
async fn transcription_error_wins_over_cleanup_error() {
    let fx = Fixture::new();
    let progress = RecordingProgress::default();
    let mut extractor = MockExtractor::new(&fx.dir.path().join("temp"));
    extractor.fail_cleanup = true;
    let mut pipeline = vidscribe_core::Pipeline::new(
        Config::default(),
        extractor,
        MockTranscriber::failing("model could not be loaded"),
        MockSummarizer::new(SummaryBehaviour::Declines),
    )
    .with_progress(progress.clone());

    let error = failure(pipeline.run(&fx.request()).await);

    assert_eq!(error, "Transcription failed: model could not be loaded");
    assert_eq!(pipeline.extractor().cleanup_calls, 1);

    let warnings = progress.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, Stage::Cleanup);

    let failures = progress.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::Transcribe);
}

#[tokio::test]
async fn unwritable_summary_is_only_a_warning() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.out.join("demo_summary.txt")).unwrap();
    let progress = RecordingProgress::default();
    let mut pipeline = fx
        .pipeline(
            MockTranscriber::returning("some words"),
            MockSummarizer::new(SummaryBehaviour::Text("short summary".into())),
        )
        .with_progress(progress.clone());

    let result = success(pipeline.run(&fx.request().with_api_key("sk-test-credential")).await);

    assert_eq!(result.summary_file, None);
    assert!(fx.out.join("demo_transcription.txt").is_file());
    assert_eq!(pipeline.summarizer().calls, 1);

    let warnings = progress.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, Stage::Summarize);
    assert!(warnings[0].1.starts_with("Summary generation failed: IO error"));
}

#[tokio::test]
async fn short_credential_is_reported_as_summary_warning() {
    let fx = Fixture::new();
    let progress = RecordingProgress::default();
    let mut pipeline = fx
        .pipeline(
            MockTranscriber::returning("some words"),
            MockSummarizer::new(SummaryBehaviour::Text("unused".into())),
        )
        .with_progress(progress.clone());

    assert!(pipeline.run(&fx.request().with_api_key("   ")).await.is_success());

    let warnings = progress.warnings.lock().unwrap();
    assert_eq!(
        warnings.as_slice(),
        &[(
            Stage::Summarize,
            "Summary generation failed: API key appears to be too short".to_string()
        )]
    );
    assert!(progress.failures.lock().unwrap().is_empty());
}

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vidscribe_core::{
    Config, FfmpegExtractor, Pipeline, PipelineOutcome, PipelineRequest, Provider, SummaryLength,
    probe_media, silence_whisper_logs,
};

use crate::progress::{CliProgress, format_duration};

mod progress;

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum CliProvider {
    Openai,
    Grok,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum CliSummaryLength {
    Short,
    Medium,
    Long,
}

impl From<CliSummaryLength> for SummaryLength {
    fn from(cli: CliSummaryLength) -> Self {
        match cli {
            CliSummaryLength::Short => SummaryLength::Short,
            CliSummaryLength::Medium => SummaryLength::Medium,
            CliSummaryLength::Long => SummaryLength::Long,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "vidscribe", version)]
#[command(about = "Transcribe local videos with Whisper and generate AI-powered summaries")]
struct Cli {
    /// Path to the input video file
    video_path: PathBuf,

    /// Directory to save the transcription and summary
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// API key for summary generation. Falls back to the provider's environment variable.
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Speech recognition language (e.g., "en", "en-US"). Detected when omitted.
    #[arg(short, long)]
    language: Option<String>,

    /// AI provider for summary generation
    #[arg(short, long)]
    provider: Option<CliProvider>,

    /// How long the summary should be
    #[arg(short, long)]
    summary_length: Option<CliSummaryLength>,

    /// Whisper model file name (e.g., "ggml-small.bin")
    #[arg(short, long)]
    model: Option<String>,

    /// Run Whisper on the CPU even when a GPU is available
    #[arg(long)]
    cpu: bool,

    /// Check the API key against the provider before processing
    #[arg(long)]
    check_key: bool,

    /// Show detailed logs
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Layer command line flags over the loaded configuration. Runs before
    /// the provider's key is looked up.
    fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.provider = provider.into();
        }
        if let Some(length) = self.summary_length {
            config.summary_length = length.into();
        }
        if let Some(model) = &self.model {
            config.model_name = model.clone();
        }
        if self.cpu {
            config.use_gpu = false;
        }
    }

    fn request(&self, config: &Config) -> PipelineRequest {
        let mut request = PipelineRequest::new(&self.video_path, &self.output_dir);
        if let Some(api_key) = self.api_key.clone().or_else(|| config.api_key.clone()) {
            request = request.with_api_key(api_key);
        }
        if let Some(language) = &self.language {
            request = request.with_language(language.clone());
        }
        request
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "vidscribe=info,vidscribe_core=info"
    } else {
        "off"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_outcome(outcome: &PipelineOutcome, config: &Config, had_key: bool) {
    match outcome {
        PipelineOutcome::Success(success) => {
            println!("{}", style("─".repeat(60)).dim());
            println!(
                "{} {}",
                style("Output:").dim(),
                style(success.output_dir.display()).cyan()
            );
            println!(
                "{} {}",
                style("Transcription:").dim(),
                style(success.transcription_file.display()).cyan()
            );
            match &success.summary_file {
                Some(path) => println!(
                    "{} {}",
                    style("Summary:").dim(),
                    style(path.display()).cyan()
                ),
                None => println!("{} {}", style("Summary:").dim(), style("not generated").dim()),
            }
            println!(
                "{} {}  {} {:.2}",
                style("Words:").dim(),
                success.word_count,
                style("Confidence:").dim(),
                success.confidence
            );
            if !had_key {
                println!(
                    "\n{} Use --api-key or set {} to generate summaries with {}.",
                    style("ℹ").blue().bold(),
                    config.provider.primary_env_var(),
                    config.provider.name()
                );
            }
        }
        PipelineOutcome::Failure { error, .. } => {
            eprintln!("\n{} {}", style("Pipeline failed:").red().bold(), error);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.verbose {
        silence_whisper_logs();
    }

    let config = Config::load_with(|config| cli.apply(config))?;
    info!(
        "Provider: {}, whisper model: {}",
        config.provider.name(),
        config.model_path().display()
    );
    let request = cli.request(&config);
    let had_key = request.api_key.as_deref().is_some_and(|k| !k.is_empty());

    println!(
        "\n{}  {}\n",
        style("vidscribe").cyan().bold(),
        style("Video Transcriber").dim()
    );
    println!(
        "{} {}",
        style("Video:").dim(),
        style(request.video_path.display()).yellow()
    );
    println!(
        "{} {}",
        style("Model:").dim(),
        style(&config.model_name).yellow()
    );
    if let Some(duration) = probe_media(&request.video_path)
        .await
        .and_then(|media| media.duration)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
    {
        println!(
            "{} {}",
            style("Duration:").dim(),
            style(format_duration(Duration::from_secs_f64(duration))).yellow()
        );
    }
    println!("{}", style("─".repeat(60)).dim());

    if !FfmpegExtractor::is_ffmpeg_available().await {
        warn!("ffmpeg -version did not succeed");
        eprintln!(
            "{} ffmpeg was not found on PATH. Install it (e.g. `apt install ffmpeg` or `brew install ffmpeg`); audio extraction will fail without it.",
            style("⚠").yellow().bold()
        );
    }

    let total_start = Instant::now();
    let summary_config = config.clone();
    let mut pipeline = Pipeline::from_config(config)?.with_progress(CliProgress::new());

    if cli.check_key {
        match request.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(api_key) if pipeline.summarizer().check_api_key(api_key).await => {
                println!("{} API key accepted", style("✓").green().bold());
            }
            Some(_) => eprintln!(
                "{} {} rejected the API key; the summary will likely fail.",
                style("⚠").yellow().bold(),
                summary_config.provider.name()
            ),
            None => eprintln!("{} No API key to check.", style("ℹ").blue().bold()),
        }
    }

    let outcome = pipeline.run(&request).await;

    print_outcome(&outcome, &summary_config, had_key);
    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    std::process::exit(outcome.exit_code());
}

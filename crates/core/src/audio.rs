use std::{
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{Result, VidscribeError},
};

pub const TARGET_SAMPLE_RATE: u32 = 16000;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// What ffprobe reports about a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub duration: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub codec: Option<String>,
    pub size: u64,
}

/// Read `ffprobe -print_format json -show_format -show_streams` output. The
/// first stream supplies sample rate, channels and codec.
pub fn parse_ffprobe(probe: &serde_json::Value, size: u64) -> MediaInfo {
    // ffprobe prints most numbers as strings
    fn number<T: std::str::FromStr>(value: &serde_json::Value) -> Option<T> {
        match value {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }

    let stream = &probe["streams"][0];
    MediaInfo {
        duration: number(&probe["format"]["duration"]),
        sample_rate: number(&stream["sample_rate"]),
        channels: number(&stream["channels"]),
        codec: stream["codec_name"].as_str().map(str::to_string),
        size,
    }
}

/// Probe `path` with ffprobe. `None` when the file is missing or ffprobe
/// fails for any reason.
pub async fn probe_media(path: &Path) -> Option<MediaInfo> {
    let size = fs::metadata(path).await.ok()?.len();

    let mut command = Command::new("ffprobe");
    command
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            debug!("ffprobe exited with {}", output.status);
            return None;
        }
        Ok(Err(e)) => {
            debug!("ffprobe could not run: {}", e);
            return None;
        }
        Err(_) => {
            warn!("ffprobe timed out on {}", path.display());
            return None;
        }
    };

    let probe: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;
    Some(parse_ffprobe(&probe, size))
}

/// Produces a temporary audio file from a video and owns its removal.
#[async_trait]
pub trait AudioExtractor: Send {
    async fn extract(&mut self, video_path: &Path) -> Result<PathBuf>;

    /// Remove every temporary file produced so far. Safe to call any number
    /// of times; per-file failures are collected into a single
    /// [`VidscribeError::CleanupFailed`] instead of stopping the sweep.
    async fn cleanup(&mut self) -> Result<()>;
}

pub struct FfmpegExtractor {
    temp_dir: PathBuf,
    timeout: Duration,
    temp_files: Vec<PathBuf>,
}

impl FfmpegExtractor {
    pub fn new(temp_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            timeout,
            temp_files: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.temp_dir, config.extraction_timeout)
    }

    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    pub async fn is_ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn get_audio_path(&self, video_path: &Path) -> PathBuf {
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let unique = uuid::Uuid::new_v4().simple().to_string();
        self.temp_dir
            .join(format!("{}_audio_{}.wav", stem, &unique[..8]))
    }

    fn failed(video_path: &Path, reason: impl Into<String>) -> VidscribeError {
        VidscribeError::ExtractionFailed {
            video_path: video_path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join("\n")
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(&mut self, video_path: &Path) -> Result<PathBuf> {
        if !video_path.is_file() {
            return Err(Self::failed(video_path, "video file not found"));
        }

        fs::create_dir_all(&self.temp_dir).await?;
        let audio_path = self.get_audio_path(video_path);

        info!("Extracting audio: {}", video_path.display());
        let mut command = Command::new("ffmpeg");
        command
            .arg("-i")
            .arg(video_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg(TARGET_SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg("1")
            .arg("-y")
            .arg(&audio_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == IoErrorKind::NotFound => {
                return Err(Self::failed(video_path, "ffmpeg not found on PATH"));
            }
            Ok(Err(e)) => return Err(Self::failed(video_path, e.to_string())),
            Err(_) => {
                let _ = fs::remove_file(&audio_path).await;
                return Err(Self::failed(
                    video_path,
                    format!("ffmpeg timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        if !output.status.success() {
            let _ = fs::remove_file(&audio_path).await;
            return Err(Self::failed(
                video_path,
                format!("ffmpeg exited with {}: {}", output.status, stderr_tail(&output.stderr)),
            ));
        }

        if !audio_path.exists() {
            return Err(Self::failed(video_path, "ffmpeg produced no output file"));
        }

        debug!("Audio written to {}", audio_path.display());
        self.temp_files.push(audio_path.clone());
        Ok(audio_path)
    }

    async fn cleanup(&mut self) -> Result<()> {
        let mut failures = Vec::new();

        for path in self.temp_files.drain(..) {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Could not remove {}: {}", path.display(), e);
                    failures.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(VidscribeError::CleanupFailed { failures })
        }
    }
}

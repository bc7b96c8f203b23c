use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    config::Config,
    error::{Result, VidscribeError},
    types::Transcription,
};

pub const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Used when the backend reports nothing to derive a confidence from.
pub const DEFAULT_CONFIDENCE: f32 = 0.9;

/// Turns an audio file into text. Implementations must fail with
/// [`VidscribeError::TranscriptionFailed`] rather than return an empty
/// transcription.
#[async_trait]
pub trait Transcriber: Send {
    async fn transcribe(
        &mut self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<Transcription>;
}

/// Reduce a hint such as `en-US` to the two letter code whisper expects.
/// `auto` and blank hints mean "detect".
pub fn normalize_language(hint: Option<&str>) -> Option<String> {
    let hint = hint?.trim();
    if hint.is_empty() || hint.eq_ignore_ascii_case("auto") {
        return None;
    }
    let primary = hint.split(['-', '_']).next().unwrap_or(hint);
    Some(primary.to_ascii_lowercase())
}

/// Mean of `1 - no_speech_probability` over segments, clamped to [0, 1].
pub fn confidence_from_no_speech(probabilities: &[f32]) -> f32 {
    if probabilities.is_empty() {
        return DEFAULT_CONFIDENCE;
    }
    let sum: f32 = probabilities.iter().map(|p| 1.0 - p.clamp(0.0, 1.0)).sum();
    (sum / probabilities.len() as f32).clamp(0.0, 1.0)
}

extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

/// Stop whisper.cpp from writing its own logs to stderr.
pub fn silence_whisper_logs() {
    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }
}

/// Download the ggml model into `model_path` unless it is already there.
pub async fn ensure_model(model_path: &Path) -> Result<PathBuf> {
    ensure_model_from(MODEL_BASE_URL, model_path).await
}

pub async fn ensure_model_from(base_url: &str, model_path: &Path) -> Result<PathBuf> {
    if model_path.exists() {
        return Ok(model_path.to_path_buf());
    }

    let model_name = model_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let download_url = format!("{}/{}", base_url.trim_end_matches('/'), model_name);

    if let Some(model_dir) = model_path.parent() {
        fs::create_dir_all(model_dir).await?;
    }

    info!("Downloading whisper model from {}", download_url);
    let partial = model_path.with_extension("part");
    if let Err(e) = download_to(&download_url, &partial).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e);
    }
    fs::rename(&partial, model_path).await?;

    Ok(model_path.to_path_buf())
}

/// Stream `url` into `dest` chunk by chunk.
async fn download_to(url: &str, dest: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
        .read_timeout(DOWNLOAD_READ_TIMEOUT)
        .build()?;

    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(VidscribeError::ModelDownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let mut file = fs::File::create(dest).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    debug!("Downloaded {} bytes to {}", written, dest.display());

    Ok(())
}

pub struct WhisperTranscriber {
    model_path: PathBuf,
    use_gpu: bool,
    context: Option<Arc<WhisperContext>>,
}

impl WhisperTranscriber {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            use_gpu: true,
            context: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.model_path()).with_gpu(config.use_gpu)
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    fn failed(audio_path: &Path, reason: impl Into<String>) -> VidscribeError {
        VidscribeError::TranscriptionFailed {
            audio_path: audio_path.to_path_buf(),
            reason: reason.into(),
        }
    }

    async fn load_context(&mut self, audio_path: &Path) -> Result<Arc<WhisperContext>> {
        if let Some(ctx) = &self.context {
            return Ok(Arc::clone(ctx));
        }

        let model_path = ensure_model(&self.model_path).await?;
        let model_path_str = model_path
            .to_str()
            .ok_or_else(|| Self::failed(audio_path, "model path is not valid UTF-8"))?
            .to_string();
        let use_gpu = self.use_gpu;

        debug!("Loading whisper model {}", model_path_str);
        let ctx = tokio::task::spawn_blocking(move || {
            let ctx_params = WhisperContextParameters {
                use_gpu,
                flash_attn: use_gpu,
                ..Default::default()
            };
            WhisperContext::new_with_params(&model_path_str, ctx_params)
        })
        .await
        .map_err(|e| Self::failed(audio_path, e.to_string()))?
        .map_err(|e| Self::failed(audio_path, format!("failed to load model: {e}")))?;

        let ctx = Arc::new(ctx);
        self.context = Some(Arc::clone(&ctx));
        Ok(ctx)
    }
}

fn read_samples(audio_path: &Path) -> std::result::Result<Vec<f32>, String> {
    let mut reader = hound::WavReader::open(audio_path).map_err(|e| e.to_string())?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())
}

fn run_whisper(
    ctx: &WhisperContext,
    audio_path: &Path,
    language: Option<&str>,
) -> std::result::Result<Transcription, String> {
    let samples = read_samples(audio_path)?;
    if samples.is_empty() {
        return Err("audio file contains no samples".to_string());
    }

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some(language.unwrap_or("auto")));
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_special(false);
    params.set_print_timestamps(false);

    let mut state = ctx.create_state().map_err(|e| e.to_string())?;
    state.full(params, &samples).map_err(|e| e.to_string())?;

    let mut text = String::new();
    let mut no_speech = Vec::new();
    for segment in state.as_iter() {
        let seg_text = match segment.to_str() {
            Ok(s) => s,
            Err(_) => continue,
        };
        text.push_str(seg_text);
        no_speech.push(segment.no_speech_probability());
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err("No speech detected in audio file".to_string());
    }

    let detected = whisper_rs::get_lang_str(state.full_lang_id_from_state());
    let language = language
        .map(str::to_string)
        .or_else(|| detected.map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Transcription::new(
        text,
        confidence_from_no_speech(&no_speech),
        language,
    ))
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &mut self,
        audio_path: &Path,
        language: Option<&str>,
    ) -> Result<Transcription> {
        if !audio_path.is_file() {
            return Err(Self::failed(audio_path, "audio file does not exist"));
        }

        let ctx = self.load_context(audio_path).await?;
        let language = normalize_language(language);
        let path = audio_path.to_path_buf();

        info!("Transcribing {}", audio_path.display());
        let transcription = tokio::task::spawn_blocking(move || {
            run_whisper(&ctx, &path, language.as_deref())
        })
        .await
        .map_err(|e| Self::failed(audio_path, e.to_string()))?
        .map_err(|reason| Self::failed(audio_path, reason))?;

        info!(
            "Transcription completed: {} words, language: {}",
            transcription.word_count(),
            transcription.language
        );
        Ok(transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_hints_are_normalized() {
        assert_eq!(normalize_language(Some("en-US")).as_deref(), Some("en"));
        assert_eq!(normalize_language(Some("pt_BR")).as_deref(), Some("pt"));
        assert_eq!(normalize_language(Some("ES")).as_deref(), Some("es"));
        assert_eq!(normalize_language(Some("auto")), None);
        assert_eq!(normalize_language(Some("  ")), None);
        assert_eq!(normalize_language(None), None);
    }

    #[test]
    fn confidence_defaults_without_segments() {
        assert_eq!(confidence_from_no_speech(&[]), DEFAULT_CONFIDENCE);
    }

    #[test]
    fn confidence_is_mean_speech_probability() {
        let confidence = confidence_from_no_speech(&[0.1, 0.3]);
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn confidence_stays_in_unit_range() {
        assert_eq!(confidence_from_no_speech(&[-2.0]), 1.0);
        assert_eq!(confidence_from_no_speech(&[7.5]), 0.0);
    }

    #[tokio::test]
    async fn missing_audio_is_a_transcription_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut transcriber = WhisperTranscriber::new(dir.path().join("model.bin"));

        let err = transcriber
            .transcribe(&dir.path().join("nothing.wav"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VidscribeError::TranscriptionFailed { .. }));
        assert!(!dir.path().join("model.bin").exists());
    }

    #[test]
    fn gpu_follows_config() {
        let config = Config {
            use_gpu: false,
            ..Config::default()
        };
        assert!(!WhisperTranscriber::from_config(&config).use_gpu);
        assert!(WhisperTranscriber::from_config(&Config::default()).use_gpu);
    }

    #[tokio::test]
    async fn failed_download_leaves_nothing_behind() {
        let dir = tempfile::TempDir::new().unwrap();
        let model = dir.path().join("models").join("ggml-tiny.bin");

        let err = ensure_model_from("http://127.0.0.1:9", &model)
            .await
            .unwrap_err();

        assert!(matches!(err, VidscribeError::ApiError(_)));
        assert!(!model.exists());
        assert!(!model.with_extension("part").exists());
    }

    #[tokio::test]
    async fn present_model_is_not_downloaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let model = dir.path().join("ggml-tiny.bin");
        std::fs::write(&model, b"weights").unwrap();

        let path = ensure_model_from("http://127.0.0.1:9", &model).await.unwrap();
        assert_eq!(path, model);
    }

    #[test]
    fn unreadable_wav_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav").unwrap();

        assert!(read_samples(&path).is_err());
    }
}

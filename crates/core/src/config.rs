//! Runtime settings, assembled once at startup and passed down explicitly.
//!
//! Precedence, lowest first: built-in defaults, the optional TOML file,
//! environment variables (a `.env` file fills in any that are unset), then
//! whatever the caller sets afterwards (CLI flags).

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    error::{Result, VidscribeError},
    provider::Provider,
    validate::{DEFAULT_VIDEO_EXTENSIONS, MIN_API_KEY_LEN},
};

pub const DEFAULT_MODEL_NAME: &str = "ggml-base.bin";
pub const CONFIG_ENV_VAR: &str = "VIDSCRIBE_CONFIG";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn instruction(&self) -> &'static str {
        match self {
            SummaryLength::Short => "in 1-2 concise sentences",
            SummaryLength::Medium => "in 3-5 sentences",
            SummaryLength::Long => "in 1-2 paragraphs",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            SummaryLength::Short => 100,
            SummaryLength::Medium => 200,
            SummaryLength::Long => 400,
        }
    }
}

impl FromStr for SummaryLength {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(SummaryLength::Short),
            "medium" => Ok(SummaryLength::Medium),
            "long" => Ok(SummaryLength::Long),
            other => Err(format!("unknown summary length '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub temp_dir: PathBuf,
    pub model_dir: PathBuf,
    pub model_name: String,
    pub provider: Provider,
    pub summary_model: Option<String>,
    pub summary_length: SummaryLength,
    pub extraction_timeout: Duration,
    pub request_timeout: Duration,
    pub allowed_extensions: Vec<String>,
    pub min_api_key_len: usize,
    pub api_key: Option<String>,
    pub use_gpu: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("vidscribe"),
            model_dir: get_model_dir(&get_root_cache_dir()),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            provider: Provider::default(),
            summary_model: None,
            summary_length: SummaryLength::default(),
            extraction_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            allowed_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            min_api_key_len: MIN_API_KEY_LEN,
            api_key: None,
            use_gpu: true,
        }
    }
}

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    temp_dir: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    model_name: Option<String>,
    provider: Option<Provider>,
    summary_model: Option<String>,
    summary_length: Option<SummaryLength>,
    extraction_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    allowed_extensions: Option<Vec<String>>,
    api_key: Option<String>,
    use_gpu: Option<bool>,
}

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vidscribe")
}

pub fn get_model_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("models")
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vidscribe").join("config.toml"))
}

/// Where a `.env` file is looked for: the working directory, then home.
pub fn dotenv_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".env"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".env"));
    }
    paths
}

pub fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let malformed = |e: dotenvy::Error| VidscribeError::ConfigFailed {
        reason: format!("{}: {}", path.display(), e),
    };
    dotenvy::from_path_iter(path)
        .map_err(malformed)?
        .collect::<std::result::Result<HashMap<_, _>, _>>()
        .map_err(malformed)
}

/// Variables from the first `.env` that exists. A broken file is skipped.
fn load_dotenv() -> HashMap<String, String> {
    let Some(path) = dotenv_candidates().into_iter().find(|p| p.is_file()) else {
        return HashMap::new();
    };
    match read_dotenv(&path) {
        Ok(vars) => {
            debug!("Loaded {} variables from {}", vars.len(), path.display());
            vars
        }
        Err(e) => {
            warn!("Ignoring .env file: {}", e);
            HashMap::new()
        }
    }
}

/// Process environment first; `.env` values only fill what it leaves unset.
pub fn env_then_dotenv(dotenv: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key: &str| {
        std::env::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| dotenv.get(key).cloned())
    }
}

impl Config {
    /// Defaults, then the config file (if any), then the process environment
    /// backed by `.env`.
    pub fn load() -> Result<Self> {
        Self::load_with(|_| {})
    }

    /// [`Config::load`] with `overrides` (usually CLI flags) applied before
    /// the credential is resolved, so an overridden provider gets its own key.
    pub fn load_with(overrides: impl FnOnce(&mut Config)) -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(default_config_path);
        let dotenv = load_dotenv();
        Self::assemble(path.as_deref(), env_then_dotenv(&dotenv), overrides)
    }

    pub fn assemble(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
        overrides: impl FnOnce(&mut Config),
    ) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_settings(&lookup);
        overrides(&mut config);
        config.apply_env_api_key(&lookup);
        Ok(config)
    }

    /// Defaults overlaid with `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }

        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        let file: FileConfig =
            toml::from_str(&content).map_err(|e| VidscribeError::ConfigFailed {
                reason: format!("{}: {}", path.display(), e),
            })?;
        config.merge(file);
        Ok(config)
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(v) = file.temp_dir {
            self.temp_dir = v;
        }
        if let Some(v) = file.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = file.model_name {
            self.model_name = v;
        }
        if let Some(v) = file.provider {
            self.provider = v;
        }
        if file.summary_model.is_some() {
            self.summary_model = file.summary_model;
        }
        if let Some(v) = file.summary_length {
            self.summary_length = v;
        }
        if let Some(secs) = file.extraction_timeout_secs {
            self.extraction_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = file.allowed_extensions {
            self.allowed_extensions = v;
        }
        if file.api_key.is_some() {
            self.api_key = file.api_key;
        }
        if let Some(v) = file.use_gpu {
            self.use_gpu = v;
        }
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.apply_env_settings(&lookup);
        self.apply_env_api_key(&lookup);
    }

    fn apply_env_settings(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup("VIDSCRIBE_TEMP_DIR") {
            self.temp_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VIDSCRIBE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VIDSCRIBE_MODEL") {
            self.model_name = v;
        }
        if let Some(provider) = lookup("VIDSCRIBE_PROVIDER").and_then(|v| v.parse().ok()) {
            self.provider = provider;
        }
        if let Some(length) = lookup("VIDSCRIBE_SUMMARY_LENGTH").and_then(|v| v.parse().ok()) {
            self.summary_length = length;
        }
    }

    /// The current provider's key, when its environment variables carry one.
    fn apply_env_api_key(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        let env_key = self
            .provider
            .config()
            .env_vars
            .iter()
            .find_map(|var| lookup(*var).filter(|v| !v.trim().is_empty()));
        if env_key.is_some() {
            self.api_key = env_key;
        }
    }

    pub fn summary_model(&self) -> &str {
        self.summary_model
            .as_deref()
            .unwrap_or(self.provider.config().model)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_name)
    }
}

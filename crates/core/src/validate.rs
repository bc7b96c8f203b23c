//! Boundary checks for the pipeline inputs: the source video, the output
//! directory and the summarization credential.

use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};

use thiserror::Error;

pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4"];
pub const MIN_API_KEY_LEN: usize = 10;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("File path cannot be empty")]
    EmptyPath,

    #[error("File does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Path is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Unsupported video format: {extension}. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    #[error("File is empty")]
    EmptyFile,

    #[error("File is not readable: {0}")]
    Unreadable(String),

    #[error("Output path cannot be empty")]
    EmptyOutputPath,

    #[error("Cannot create output directory {}: {reason}", path.display())]
    OutputDirCreate { path: PathBuf, reason: String },

    #[error("Output directory is not writable: {}", .0.display())]
    OutputDirNotWritable(PathBuf),

    #[error("API key cannot be empty")]
    EmptyApiKey,

    #[error("API key appears to be too short")]
    ApiKeyTooShort,
}

/// A video that passed [`validate_video_file`].
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

impl VideoFile {
    /// File name without its extension, used to name the artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone())
    }
}

fn dotted(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.').to_lowercase())
}

pub fn validate_video_format(path: &Path, allowed: &[String]) -> Result<(), ValidationError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let accepted = allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&extension));

    if !accepted {
        return Err(ValidationError::UnsupportedFormat {
            extension: if extension.is_empty() {
                String::new()
            } else {
                dotted(&extension)
            },
            supported: allowed
                .iter()
                .map(|a| dotted(a))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    Ok(())
}

/// Check that the video exists, is a regular non-empty readable file and has
/// one of the `allowed` extensions (compared case-insensitively, with or
/// without a leading dot).
pub fn validate_video_file(path: &Path, allowed: &[String]) -> Result<VideoFile, ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyPath);
    }

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return Err(ValidationError::NotFound(path.to_path_buf())),
    };

    if !metadata.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }

    validate_video_format(path, allowed)?;

    if metadata.len() == 0 {
        return Err(ValidationError::EmptyFile);
    }

    let mut probe = [0u8; 1024];
    File::open(path)
        .and_then(|mut f| f.read(&mut probe))
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;

    Ok(VideoFile {
        path: path.to_path_buf(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size: metadata.len(),
    })
}

/// Create the output directory if needed and make sure files can be written
/// into it.
pub fn validate_output_dir(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyOutputPath);
    }

    fs::create_dir_all(path).map_err(|e| ValidationError::OutputDirCreate {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let probe = path.join(format!(".vidscribe-write-{}", uuid::Uuid::new_v4()));
    match File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err(ValidationError::OutputDirNotWritable(path.to_path_buf())),
    }
}

pub fn validate_api_key(key: &str, min_len: usize) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyApiKey);
    }
    if key.trim().chars().count() < min_len {
        return Err(ValidationError::ApiKeyTooShort);
    }
    Ok(())
}

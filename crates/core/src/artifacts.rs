use std::path::{Path, PathBuf};

use tokio::fs;

use crate::{
    error::Result,
    types::{Summary, Transcription},
};

pub const TRANSCRIPTION_SUFFIX: &str = "_transcription.txt";
pub const SUMMARY_SUFFIX: &str = "_summary.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `<output_dir>/<stem>_transcription.txt`
pub fn get_transcription_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}{}", stem, TRANSCRIPTION_SUFFIX))
}

/// `<output_dir>/<stem>_summary.txt`
pub fn get_summary_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}{}", stem, SUMMARY_SUFFIX))
}

pub fn format_transcription(transcription: &Transcription) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Transcription Generated: {}\n",
        transcription.created_at.format(TIMESTAMP_FORMAT)
    ));
    output.push_str(&format!("Language: {}\n", transcription.language));
    output.push_str(&format!("Confidence: {:.2}\n", transcription.confidence));
    output.push_str(&format!("Word Count: {}\n", transcription.word_count()));
    output.push_str(&"-".repeat(50));
    output.push_str("\n\n");
    output.push_str(&transcription.text);
    output
}

pub fn format_summary(summary: &Summary) -> String {
    let mut output = String::new();
    output.push_str("# Summary\n");
    output.push_str(&format!(
        "Generated: {}\n",
        summary.created_at.format(TIMESTAMP_FORMAT)
    ));
    output.push_str(&format!(
        "Original length: {} characters\n",
        summary.original_length
    ));
    output.push_str(&format!(
        "Summary length: {} characters\n",
        summary.summary_length()
    ));
    output.push_str(&format!(
        "Compression ratio: {:.2}%\n",
        summary.compression_ratio() * 100.0
    ));
    output.push_str("\n---\n\n");
    output.push_str(&summary.text);
    output
}

async fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}

pub async fn save_transcription(transcription: &Transcription, path: &Path) -> Result<()> {
    write_text(path, &format_transcription(transcription)).await
}

pub async fn save_summary(summary: &Summary, path: &Path) -> Result<()> {
    write_text(path, &format_summary(summary)).await
}

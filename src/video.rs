use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Video information extracted from the container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub filename: String,
    pub duration: Duration,
    pub format: String,
    pub file_size: u64,
    pub has_audio: bool,
}

/// Validates input containers and reads their metadata via ffprobe
#[derive(Clone)]
pub struct VideoProcessor {
    supported_extensions: Vec<String>,
}

impl VideoProcessor {
    pub fn new(supported_extensions: Vec<String>) -> Self {
        Self {
            supported_extensions,
        }
    }

    /// Check that ffmpeg and ffprobe are on the PATH. Both are required
    /// before any pipeline stage runs.
    pub async fn check_dependencies() -> Result<()> {
        for tool in ["ffmpeg", "ffprobe"] {
            let status = tokio::process::Command::new(tool)
                .arg("-version")
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .await;

            match status {
                Ok(s) if s.success() => {}
                _ => return Err(anyhow!("{} is not installed or not on PATH", tool)),
            }
        }
        info!("✓ FFmpeg is installed");
        Ok(())
    }

    /// Validate that a source file exists and carries a supported extension.
    /// Both failures are fatal before any pipeline stage runs.
    pub fn validate_source(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(anyhow!("Video file not found: {}", path.display()));
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| anyhow!("Video file has no extension: {}", path.display()))?;

        if !self.supported_extensions.contains(&ext) {
            return Err(anyhow!(
                "Unsupported video format: .{} (supported: {})",
                ext,
                self.supported_extensions.join(", ")
            ));
        }

        Ok(())
    }

    /// Read container metadata with ffprobe
    pub async fn get_video_info(&self, path: &Path) -> Result<VideoInfo> {
        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
                path.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
            ])
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        let ffprobe_data: serde_json::Value = serde_json::from_str(&json_str)?;

        let format = &ffprobe_data["format"];
        let duration_seconds: f64 = format["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        let has_audio = ffprobe_data["streams"]
            .as_array()
            .map(|streams| {
                streams
                    .iter()
                    .any(|s| s["codec_type"].as_str() == Some("audio"))
            })
            .unwrap_or(false);

        let file_size = tokio::fs::metadata(path).await?.len();

        Ok(VideoInfo {
            path: path.to_path_buf(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            duration: Duration::from_secs_f64(duration_seconds),
            format: format["format_name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            file_size,
            has_audio,
        })
    }

    /// Default output path: `<stem>_clean.<ext>` next to the input
    pub fn default_output_path(&self, input: &Path, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string());

        input
            .with_file_name(format!("{}{}.{}", stem, suffix, ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn processor() -> VideoProcessor {
        VideoProcessor::new(vec!["mp4".to_string(), "mkv".to_string()])
    }

    #[test]
    fn test_validate_missing_file() {
        let result = processor().validate_source(Path::new("/nonexistent/clip.mp4"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_validate_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, b"not a video").unwrap();

        let result = processor().validate_source(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unsupported"));
    }

    #[test]
    fn test_validate_supported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.MP4");
        std::fs::write(&path, b"mock video").unwrap();

        assert!(processor().validate_source(&path).is_ok());
    }

    #[test]
    fn test_default_output_path() {
        let out = processor().default_output_path(Path::new("/videos/talk.mp4"), "_clean");
        assert_eq!(out, PathBuf::from("/videos/talk_clean.mp4"));
    }
}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Extracted audio track information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub path: PathBuf,
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u32,
    pub file_size: u64,
}

/// Capability interface for pulling a transcription-ready audio track out of
/// a media container. Production implementation shells out to ffmpeg; tests
/// substitute an in-memory fake.
#[async_trait]
pub trait AudioExtractionService: Send + Sync {
    /// Extract a mono PCM track suitable for transcription
    async fn extract(&self, video_path: &Path, output_dir: &Path) -> Result<AudioInfo>;
}

/// FFmpeg-based audio extractor
#[derive(Clone)]
pub struct AudioExtractor {
    /// Target sample rate (Whisper optimal)
    pub target_sample_rate: u32,
}

impl AudioExtractor {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Get detailed audio information via ffprobe
    pub async fn get_audio_info(&self, audio_path: &Path) -> Result<AudioInfo> {
        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
                "-select_streams", "a:0",
                audio_path.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
            ])
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", audio_path.display()));
        }

        let json_str = String::from_utf8(output.stdout)?;
        let ffprobe_data: serde_json::Value = serde_json::from_str(&json_str)?;

        let format = &ffprobe_data["format"];
        let streams = ffprobe_data["streams"]
            .as_array()
            .ok_or_else(|| anyhow!("No stream data in ffprobe output"))?;
        let audio_stream = streams
            .first()
            .ok_or_else(|| anyhow!("No audio stream found in {}", audio_path.display()))?;

        let duration_seconds: f64 = format["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);

        let file_size = tokio::fs::metadata(audio_path).await?.len();

        Ok(AudioInfo {
            path: audio_path.to_path_buf(),
            duration: Duration::from_secs_f64(duration_seconds),
            sample_rate: audio_stream["sample_rate"]
                .as_str()
                .and_then(|s| s.parse().ok())
                .unwrap_or(self.target_sample_rate),
            channels: audio_stream["channels"].as_u64().unwrap_or(1) as u32,
            file_size,
        })
    }

    /// Clean up leftover temporary audio files in a directory
    pub async fn cleanup_temp_files(&self, temp_dir: &Path) -> Result<()> {
        let mut entries = tokio::fs::read_dir(temp_dir).await?;
        let mut cleaned = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "wav" || ext == "tmp") {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove temp file {}: {}", path.display(), e);
                } else {
                    cleaned += 1;
                }
            }
        }

        if cleaned > 0 {
            info!("🧹 Cleaned up {} temporary audio files", cleaned);
        }

        Ok(())
    }
}

#[async_trait]
impl AudioExtractionService for AudioExtractor {
    async fn extract(&self, video_path: &Path, output_dir: &Path) -> Result<AudioInfo> {
        let filename = video_path
            .file_stem()
            .ok_or_else(|| anyhow!("Invalid video filename"))?
            .to_string_lossy();

        let audio_path = output_dir.join(format!("{}_temp_audio.wav", filename));

        info!("🎵 Extracting audio from video: {}", video_path.display());

        tokio::fs::create_dir_all(output_dir).await?;

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i", video_path.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
                "-vn", // No video stream
                "-acodec", "pcm_s16le", // 16-bit PCM
                "-ar", &self.target_sample_rate.to_string(),
                "-ac", "1", // Mono channel
                "-f", "wav",
                "-y", // Overwrite existing
                audio_path.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
            ])
            .status()
            .await?;

        if !status.success() {
            return Err(anyhow!(
                "Audio extraction failed for {}",
                video_path.display()
            ));
        }

        let audio_info = self.get_audio_info(&audio_path).await?;

        info!(
            "✅ Audio extracted: {} ({:.1}s, {}Hz)",
            audio_info.path.display(),
            audio_info.duration.as_secs_f64(),
            audio_info.sample_rate
        );

        Ok(audio_info)
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new(16000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_extractor_creation() {
        let extractor = AudioExtractor::default();
        assert_eq!(extractor.target_sample_rate, 16000);
    }

    #[tokio::test]
    async fn test_cleanup_temp_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let wav = temp_dir.path().join("clip_temp_audio.wav");
        let keep = temp_dir.path().join("clip.mp4");
        tokio::fs::write(&wav, b"riff").await.unwrap();
        tokio::fs::write(&keep, b"video").await.unwrap();

        let extractor = AudioExtractor::default();
        extractor.cleanup_temp_files(temp_dir.path()).await.unwrap();

        assert!(!wav.exists());
        assert!(keep.exists());
    }
}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use super::{Segment, TranscriptionService};
use crate::audio::AudioInfo;
use crate::config::TranscriptionConfig;

/// Whisper JSON output shape (only the fields the pipeline consumes)
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Transcriber backed by the OpenAI Whisper command-line tool
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self { config }
    }

    async fn check_command_available(cmd: &str) -> bool {
        tokio::process::Command::new(cmd)
            .arg("--help")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn run_whisper(&self, audio_path: &Path, language: Option<&str>) -> Result<WhisperOutput> {
        let output_dir = tempfile::TempDir::new()?;

        let audio_str = audio_path
            .to_str()
            .ok_or_else(|| anyhow!("Non-UTF8 audio path"))?;
        let dir_str = output_dir
            .path()
            .to_str()
            .ok_or_else(|| anyhow!("Non-UTF8 temp dir path"))?;

        let mut cmd = tokio::process::Command::new("whisper");
        cmd.args([
            audio_str,
            "--model", &self.config.model,
            "--output_format", "json",
            "--output_dir", dir_str,
        ]);

        if let Some(lang) = language.filter(|l| *l != "auto") {
            cmd.args(["--language", lang]);
        }

        info!("🎤 Transcribing audio with Whisper (model: {})", self.config.model);

        let status = tokio::time::timeout(
            std::time::Duration::from_secs(self.config.timeout as u64),
            cmd.status(),
        )
        .await
        .map_err(|_| anyhow!("Whisper transcription timed out"))??;

        if !status.success() {
            return Err(anyhow!("Whisper exited with status {}", status));
        }

        let base_name = audio_path
            .file_stem()
            .ok_or_else(|| anyhow!("Invalid audio filename"))?
            .to_string_lossy();
        let json_path = output_dir.path().join(format!("{}.json", base_name));

        let json_str = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            anyhow!("Whisper output not found at {}: {}", json_path.display(), e)
        })?;

        let parsed: WhisperOutput = serde_json::from_str(&json_str)?;
        Ok(parsed)
    }
}

#[async_trait]
impl TranscriptionService for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioInfo, language: Option<&str>) -> Result<Vec<Segment>> {
        let hint = language.or(self.config.language.as_deref());
        let output = self.run_whisper(&audio.path, hint).await?;

        if let Some(lang) = &output.language {
            info!("🌍 Detected language: {}", lang);
        }

        let mut segments: Vec<Segment> = output
            .segments
            .into_iter()
            .map(|s| Segment::new(s.start, s.end, s.text.trim().to_string()))
            .collect();

        // Transcription backends occasionally emit out-of-order segments;
        // downstream ordering guarantees start here.
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));

        if segments.is_empty() {
            warn!("Whisper returned no segments for {}", audio.path.display());
        } else {
            info!("✅ Transcription completed: {} segments", segments.len());
        }

        Ok(segments)
    }

    async fn is_available(&self) -> bool {
        Self::check_command_available("whisper").await
    }
}

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::audio::{AudioExtractionService, AudioExtractor};
use crate::config::Config;
use crate::detection::aggregator::{DetectionAggregator, FlaggedSegment};
use crate::detection::classifier::{
    ClassificationService, ClassifierVerdict, GeminiClassifier, SemanticClassifier,
};
use crate::detection::{CompiledMatcher, MuteWindow, WordList};
use crate::muter::{FfmpegRenderer, RenderingService};
use crate::transcription::{placeholder_segments, Segment, TranscriptionService, WhisperTranscriber};
use crate::video::VideoProcessor;

/// Stage-level error taxonomy. Setup errors abort before any pipeline work;
/// stage errors abort the run with the failing stage named. Per-segment
/// classifier failures never surface here - they degrade to no-signal inside
/// the detection loop.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Rendering failed: {0}")]
    Rendering(String),
}

/// Detection outcome handed to the operator before rendering
#[derive(Debug)]
pub struct DetectionOutcome {
    pub windows: Vec<MuteWindow>,
    pub flagged: Vec<FlaggedSegment>,
    pub segment_count: usize,
    pub degraded_mode: bool,
    pub total_muted_duration: f64,
}

/// JSON run report written next to the output file
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub created_at: DateTime<Utc>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub segment_count: usize,
    pub muted_segments: Vec<FlaggedSegment>,
    pub total_muted_seconds: f64,
    pub degraded_mode: bool,
    pub processing_seconds: f64,
}

impl RunReport {
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        info!("💾 Run report saved to: {}", path.display());
        Ok(())
    }
}

/// Sequential detection pipeline: extract audio, transcribe, match and
/// classify each segment in order, accumulate mute windows, then render.
/// Single logical worker throughout - the classifier's process-wide rate
/// limit makes segment-level parallelism pointless.
pub struct Pipeline {
    config: Config,
    video: VideoProcessor,
    matcher: CompiledMatcher,
    extractor: Box<dyn AudioExtractionService>,
    transcriber: Box<dyn TranscriptionService>,
    classifier: SemanticClassifier,
    renderer: Box<dyn RenderingService>,
}

impl Pipeline {
    /// Build a pipeline with the production services (ffmpeg, whisper,
    /// Gemini). Classifier is optional: without an API key the pipeline
    /// runs lexical-only.
    pub fn new(config: Config) -> Result<Self> {
        let classification: Option<Box<dyn ClassificationService>> =
            match &config.classifier.api_key {
                Some(_) => Some(Box::new(GeminiClassifier::new(config.classifier.clone())?)),
                None => {
                    warn!("⚠️ No classifier API key configured, using local detection only");
                    None
                }
            };

        let extractor = Box::new(AudioExtractor::new(config.audio.target_sample_rate));
        let transcriber = Box::new(WhisperTranscriber::new(config.transcription.clone()));
        let renderer = Box::new(FfmpegRenderer::new());

        Self::with_services(config, extractor, transcriber, classification, renderer)
    }

    /// Build a pipeline with injected services. The core logic only depends
    /// on the capability interfaces, so tests drive it with fakes.
    pub fn with_services(
        config: Config,
        extractor: Box<dyn AudioExtractionService>,
        transcriber: Box<dyn TranscriptionService>,
        classification: Option<Box<dyn ClassificationService>>,
        renderer: Box<dyn RenderingService>,
    ) -> Result<Self> {
        config.validate()?;

        let word_list = WordList::conservative().with_custom_terms(
            config.detection.custom_terms.iter().map(String::as_str),
        );
        let matcher = word_list.compile()?;
        let classifier = SemanticClassifier::new(classification, &config.classifier);

        Ok(Self {
            video: VideoProcessor::new(config.processing.supported_extensions.clone()),
            matcher,
            extractor,
            transcriber,
            classifier,
            renderer,
            config,
        })
    }

    pub fn video_processor(&self) -> &VideoProcessor {
        &self.video
    }

    /// Run extraction, transcription and detection. Rendering is a separate
    /// step so the operator can review the summary first.
    pub async fn detect(&self, source: &Path) -> Result<DetectionOutcome> {
        self.video
            .validate_source(source)
            .map_err(|e| PipelineError::Setup(e.to_string()))?;

        if self.config.processing.validate_videos {
            let video_info = self
                .video
                .get_video_info(source)
                .await
                .map_err(|e| PipelineError::Setup(e.to_string()))?;

            if !video_info.has_audio {
                return Err(
                    PipelineError::Setup(format!("No audio stream in {}", source.display()))
                        .into(),
                );
            }
        }

        // Extracted audio lives in a scoped temp dir, removed on every exit
        // path when the guard drops (unless cleanup is disabled below).
        let temp_dir = tempfile::TempDir::new()?;

        let audio = self
            .extractor
            .extract(source, temp_dir.path())
            .await
            .map_err(|e| PipelineError::AudioExtraction(e.to_string()))?;

        let (segments, degraded_mode) = self.transcribe_or_degrade(&audio).await?;

        info!(
            "🔍 Detecting inappropriate language in {} segments (CONSERVATIVE mode)...",
            segments.len()
        );

        let mut aggregator = DetectionAggregator::new();

        for (i, segment) in segments.iter().enumerate() {
            info!(
                "🔍 Analyzing segment {}/{}: \"{}\"",
                i + 1,
                segments.len(),
                truncate(&segment.text, 50)
            );

            let lexical = self.matcher.find_matches(&segment.text);

            let verdict = if self.classifier.should_classify(&segment.text, !lexical.is_empty()) {
                self.classifier.evaluate(&segment.text).await
            } else {
                ClassifierVerdict::no_signal()
            };

            aggregator.aggregate(segment, &lexical, &verdict);
        }

        aggregator.print_summary();

        if !self.config.audio.cleanup_temp_files {
            let kept = temp_dir.into_path();
            info!("🗂 Keeping extracted audio in: {}", kept.display());
        }

        Ok(DetectionOutcome {
            total_muted_duration: aggregator.total_muted_duration(),
            windows: aggregator.windows().to_vec(),
            flagged: aggregator.flagged_segments().to_vec(),
            segment_count: segments.len(),
            degraded_mode,
        })
    }

    async fn transcribe_or_degrade(
        &self,
        audio: &crate::audio::AudioInfo,
    ) -> Result<(Vec<Segment>, bool)> {
        if self.transcriber.is_available().await {
            let language = self.config.transcription.language.as_deref();
            let segments = self
                .transcriber
                .transcribe(audio, language)
                .await
                .map_err(|e| PipelineError::Transcription(e.to_string()))?;
            Ok((segments, false))
        } else {
            warn!("⚠️ Transcription unavailable, falling back to fixed-length segments");
            let segments = placeholder_segments(
                audio.duration,
                self.config.transcription.placeholder_segment_secs,
            );
            info!("✓ Created {} segments for manual review", segments.len());
            Ok((segments, true))
        }
    }

    /// Render the clean copy for a finished detection pass
    pub async fn render(
        &self,
        source: &Path,
        windows: &[MuteWindow],
        output: &Path,
    ) -> Result<()> {
        self.renderer
            .render(source, windows, output)
            .await
            .map_err(|e| PipelineError::Rendering(e.to_string()))?;
        Ok(())
    }

    /// Full run: detect then render, producing a run report
    pub async fn run(&self, source: &Path, output: &Path) -> Result<RunReport> {
        let start = Instant::now();

        let outcome = self.detect(source).await?;
        self.render(source, &outcome.windows, output).await?;

        let report = RunReport {
            created_at: Utc::now(),
            input: source.to_path_buf(),
            output: output.to_path_buf(),
            segment_count: outcome.segment_count,
            muted_segments: outcome.flagged,
            total_muted_seconds: outcome.total_muted_duration,
            degraded_mode: outcome.degraded_mode,
            processing_seconds: start.elapsed().as_secs_f64(),
        };

        if self.config.output.save_report {
            let report_path = output.with_extension("report.json");
            if let Err(e) = report.save(&report_path).await {
                warn!("Failed to save run report: {}", e);
            }
        }

        Ok(report)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 50), "short");
        let long = "x".repeat(60);
        let cut = truncate(&long, 50);
        assert_eq!(cut.chars().count(), 53);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = PipelineError::Transcription("whisper exited".to_string());
        assert!(err.to_string().contains("Transcription"));
    }
}

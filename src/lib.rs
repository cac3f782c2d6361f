/// Profanity Muter - Rust Implementation
///
/// Conservative content-moderation pipeline for spoken media: transcribes the
/// audio track of a video, flags segments containing explicit language, and
/// renders a copy of the video with only those time windows silenced.

pub mod video;
pub mod audio;
pub mod transcription;
pub mod detection;
pub mod muter;
pub mod pipeline;
pub mod config;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::video::{VideoProcessor, VideoInfo};
pub use crate::audio::{AudioExtractionService, AudioExtractor, AudioInfo};
pub use crate::transcription::{Segment, TranscriptionService, WhisperTranscriber};
pub use crate::detection::{CompiledMatcher, MuteWindow, ScriptFamily, WordList};
pub use crate::detection::classifier::{
    ClassificationService, ClassifierVerdict, GeminiClassifier, SemanticClassifier,
};
pub use crate::detection::aggregator::{DetectionAggregator, FlaggedSegment};
pub use crate::muter::{FfmpegRenderer, RenderingService};
pub use crate::pipeline::{Pipeline, PipelineError, RunReport};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the profanity muter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input validation and processing settings
    pub processing: ProcessingConfig,

    /// Audio extraction settings
    pub audio: AudioConfig,

    /// Transcription settings
    pub transcription: TranscriptionConfig,

    /// Semantic classifier settings
    pub classifier: ClassifierConfig,

    /// Lexical detection settings
    pub detection: DetectionConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Supported video file extensions
    pub supported_extensions: Vec<String>,

    /// Validate the video container with ffprobe before processing
    pub validate_videos: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Target sample rate for transcription
    pub target_sample_rate: u32,

    /// Remove the extracted audio when the run finishes; disable to keep
    /// it around for debugging
    pub cleanup_temp_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model to use
    pub model: String,

    /// Language hint for transcription (None = auto-detect)
    pub language: Option<String>,

    /// Timeout for the transcription run (seconds)
    pub timeout: u32,

    /// Placeholder segment length for degraded mode (seconds)
    pub placeholder_segment_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// API key for the classification service
    pub api_key: Option<String>,

    /// Model to use for classification
    pub model: String,

    /// Minimum confidence required to accept a semantic detection
    pub confidence_threshold: f64,

    /// Minimum spacing between classifier dispatches (milliseconds)
    pub rate_limit_interval_ms: u64,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Segments with at most this many tokens are classified even
    /// without a lexical hit
    pub short_text_token_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Extra terms to filter, unioned into the built-in word lists
    pub custom_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Suffix appended to the input file stem for the clean copy
    pub output_suffix: String,

    /// Write a JSON run report next to the output file
    pub save_report: bool,

    /// Log level
    pub log_level: String,
}

impl ClassifierConfig {
    /// Minimum spacing between classifier dispatches
    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "profanity-muter.toml",
            "config/profanity-muter.toml",
            "~/.config/profanity-muter/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(api_key) = std::env::var("PROFANITY_MUTER_API_KEY") {
            config.classifier.api_key = Some(api_key);
        }

        if let Ok(threshold) = std::env::var("PROFANITY_MUTER_CONFIDENCE") {
            config.classifier.confidence_threshold = threshold.parse().unwrap_or(0.8);
        }

        if let Ok(interval) = std::env::var("PROFANITY_MUTER_RATE_LIMIT_MS") {
            config.classifier.rate_limit_interval_ms = interval.parse().unwrap_or(2000);
        }

        if let Ok(sample_rate) = std::env::var("PROFANITY_MUTER_SAMPLE_RATE") {
            config.audio.target_sample_rate = sample_rate.parse().unwrap_or(16000);
        }

        if let Ok(log_level) = std::env::var("PROFANITY_MUTER_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.target_sample_rate == 0 {
            return Err(anyhow!("target_sample_rate must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.classifier.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }

        if self.transcription.placeholder_segment_secs <= 0.0 {
            return Err(anyhow!("placeholder_segment_secs must be positive"));
        }

        if self.processing.supported_extensions.is_empty() {
            return Err(anyhow!("supported_extensions must not be empty"));
        }

        Ok(())
    }

    /// Default tracing filter derived from the configured log level.
    /// `RUST_LOG` still takes precedence at startup.
    pub fn env_filter(&self) -> String {
        format!("profanity_muter={},warn", self.output.log_level)
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Profanity Muter Configuration:\n\
            - Audio Sample Rate: {}Hz\n\
            - Whisper Model: {}\n\
            - Classifier Model: {}\n\
            - Confidence Threshold: {}\n\
            - Rate Limit Interval: {}ms\n\
            - Supported Extensions: {}\n\
            - Custom Terms: {}",
            self.audio.target_sample_rate,
            self.transcription.model,
            self.classifier.model,
            self.classifier.confidence_threshold,
            self.classifier.rate_limit_interval_ms,
            self.processing.supported_extensions.join(", "),
            self.detection.custom_terms.len()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig {
                supported_extensions: vec![
                    "mp4".to_string(),
                    "avi".to_string(),
                    "mov".to_string(),
                    "mkv".to_string(),
                    "wmv".to_string(),
                    "flv".to_string(),
                    "webm".to_string(),
                ],
                validate_videos: true,
            },
            audio: AudioConfig {
                target_sample_rate: 16000, // Optimal for Whisper
                cleanup_temp_files: true,
            },
            transcription: TranscriptionConfig {
                model: "base".to_string(),
                language: None,
                timeout: 3600,
                placeholder_segment_secs: 3.0,
            },
            classifier: ClassifierConfig {
                api_key: None,
                model: "gemini-2.0-flash-exp".to_string(),
                confidence_threshold: 0.8,
                rate_limit_interval_ms: 2000,
                timeout_seconds: 30,
                short_text_token_limit: 3,
            },
            detection: DetectionConfig {
                custom_terms: Vec::new(),
            },
            output: OutputConfig {
                output_suffix: "_clean".to_string(),
                save_report: true,
                log_level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.classifier.api_key = Some(api_key);
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.config.classifier.confidence_threshold = threshold;
        self
    }

    pub fn with_rate_limit_interval(mut self, interval: Duration) -> Self {
        self.config.classifier.rate_limit_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_custom_terms(mut self, terms: Vec<String>) -> Self {
        self.config.detection.custom_terms = terms;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.config.transcription.language = language;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.target_sample_rate, 16000);
        assert_eq!(config.classifier.confidence_threshold, 0.8);
        assert_eq!(config.classifier.rate_limit_interval_ms, 2000);
        assert!(config.processing.supported_extensions.contains(&"mp4".to_string()));
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_confidence_threshold(0.9)
            .with_rate_limit_interval(Duration::from_secs(5))
            .with_custom_terms(vec!["blaggard".to_string()])
            .build();

        assert_eq!(config.classifier.confidence_threshold, 0.9);
        assert_eq!(config.classifier.rate_limit_interval(), Duration::from_secs(5));
        assert_eq!(config.detection.custom_terms.len(), 1);
    }

    #[test]
    fn test_env_filter_follows_log_level() {
        let mut config = Config::default();
        assert_eq!(config.env_filter(), "profanity_muter=info,warn");

        config.output.log_level = "debug".to_string();
        assert_eq!(config.env_filter(), "profanity_muter=debug,warn");
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut bad = Config::default();
        bad.classifier.confidence_threshold = 1.5;
        assert!(bad.validate().is_err());
    }
}

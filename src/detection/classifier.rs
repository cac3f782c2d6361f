use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;

/// Structured verdict from the semantic classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    #[serde(rename = "hasProfanity")]
    pub has_profanity: bool,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl ClassifierVerdict {
    /// Sentinel result for failures and rejected detections: contributes
    /// nothing to the candidate, never aborts the run.
    pub fn no_signal() -> Self {
        Self {
            has_profanity: false,
            words: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Capability interface for the external judgment service. Production
/// implementation calls the Gemini API; tests substitute scripted fakes.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassifierVerdict>;
}

/// Process-wide spacing between classifier dispatches. The last-dispatch
/// instant is the only mutable shared state in the pipeline; the mutex is
/// held across the wait so a second caller can never slip inside the
/// interval.
pub struct RateLimiter {
    interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Suspend until the minimum interval since the previous dispatch has
    /// elapsed, then record this dispatch. True wait, not a busy poll.
    pub async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Gemini-backed production classifier
pub struct GeminiClassifier {
    config: ClassifierConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl GeminiClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("Gemini API key required for semantic classification"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }

    fn build_prompt(text: &str) -> String {
        format!(
            "Analyze this text VERY STRICTLY for only extreme profanity/vulgar language. \
             Be CONSERVATIVE - only flag words that are clearly offensive slurs, sexual \
             vulgarities, or extreme profanity. DO NOT flag common words, names, or mild language.\n\n\
             Text: \"{}\"\n\n\
             Respond with JSON only:\n\
             {{\n\
               \"hasProfanity\": true/false,\n\
               \"words\": [\"only_extreme_profanity\"],\n\
               \"confidence\": 0.0-1.0\n\
             }}",
            text
        )
    }
}

/// Strict decode of the model's reply. Accepts an optional markdown code
/// fence around the JSON object; any other shape mismatch is an error the
/// caller degrades to no-signal. No substring scanning.
pub(crate) fn parse_verdict(reply: &str) -> Result<ClassifierVerdict> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let verdict: ClassifierVerdict = serde_json::from_str(body)?;

    if !(0.0..=1.0).contains(&verdict.confidence) {
        return Err(anyhow!("Classifier confidence out of range: {}", verdict.confidence));
    }

    Ok(verdict)
}

#[async_trait]
impl ClassificationService for GeminiClassifier {
    async fn classify(&self, text: &str) -> Result<ClassifierVerdict> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Gemini API key not configured"))?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Self::build_prompt(text),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: 256,
                temperature: 0.0,
            },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.config.model, api_key
        );

        debug!("Sending classification request to Gemini");

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, text));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let reply = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| anyhow!("Empty response from Gemini"))?;

        parse_verdict(reply)
    }
}

/// Gated, rate-limited wrapper around a `ClassificationService`. Applies the
/// dispatch gate, the process-wide rate limit, and the confidence threshold;
/// every failure mode degrades to no-signal for the segment at hand.
pub struct SemanticClassifier {
    service: Option<Box<dyn ClassificationService>>,
    limiter: RateLimiter,
    confidence_threshold: f64,
    short_text_token_limit: usize,
}

impl SemanticClassifier {
    pub fn new(service: Option<Box<dyn ClassificationService>>, config: &ClassifierConfig) -> Self {
        Self {
            service,
            limiter: RateLimiter::new(config.rate_limit_interval()),
            confidence_threshold: config.confidence_threshold,
            short_text_token_limit: config.short_text_token_limit,
        }
    }

    /// Dispatch gate: only classify when the lexical pass already hit, or
    /// the utterance is short enough that it is likely a bare exclamation.
    pub fn should_classify(&self, text: &str, has_lexical_hit: bool) -> bool {
        if self.service.is_none() {
            return false;
        }
        has_lexical_hit || text.split_whitespace().count() <= self.short_text_token_limit
    }

    /// Classify one segment's text. Returns an accepted verdict or no-signal;
    /// never an error, never more than one in-flight dispatch.
    pub async fn evaluate(&self, text: &str) -> ClassifierVerdict {
        let service = match &self.service {
            Some(s) => s,
            None => return ClassifierVerdict::no_signal(),
        };

        self.limiter.acquire().await;

        let verdict = match service.classify(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!("⚠️ Classifier error, using local detection only: {}", e);
                return ClassifierVerdict::no_signal();
            }
        };

        if verdict.has_profanity && verdict.confidence > self.confidence_threshold {
            debug!(
                "High-confidence semantic detection: {:?} ({:.2})",
                verdict.words, verdict.confidence
            );
            verdict
        } else {
            if verdict.has_profanity {
                debug!(
                    "Low confidence semantic detection ignored ({:.2} <= {:.2})",
                    verdict.confidence, self.confidence_threshold
                );
            }
            ClassifierVerdict::no_signal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedClassifier {
        verdict: ClassifierVerdict,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ClassificationService for ScriptedClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassifierVerdict> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.verdict.clone())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ClassificationService for FailingClassifier {
        async fn classify(&self, _text: &str) -> Result<ClassifierVerdict> {
            Err(anyhow!("connection reset"))
        }
    }

    fn config(threshold: f64, interval_ms: u64) -> ClassifierConfig {
        ClassifierConfig {
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            confidence_threshold: threshold,
            rate_limit_interval_ms: interval_ms,
            timeout_seconds: 5,
            short_text_token_limit: 3,
        }
    }

    fn scripted(verdict: ClassifierVerdict) -> (Box<dyn ClassificationService>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(ScriptedClassifier {
                verdict,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn test_parse_verdict_plain_json() {
        let verdict =
            parse_verdict(r#"{"hasProfanity": true, "words": ["fuck"], "confidence": 0.95}"#)
                .unwrap();
        assert!(verdict.has_profanity);
        assert_eq!(verdict.words, vec!["fuck"]);
    }

    #[test]
    fn test_parse_verdict_code_fence() {
        let reply = "```json\n{\"hasProfanity\": false, \"words\": [], \"confidence\": 0.1}\n```";
        let verdict = parse_verdict(reply).unwrap();
        assert!(!verdict.has_profanity);
    }

    #[test]
    fn test_parse_verdict_rejects_garbage() {
        assert!(parse_verdict("I think this text is fine.").is_err());
        assert!(parse_verdict(r#"{"hasProfanity": "maybe"}"#).is_err());
        assert!(parse_verdict(r#"{"hasProfanity": true, "confidence": 3.0}"#).is_err());
    }

    #[tokio::test]
    async fn test_confidence_gate_rejects_below_threshold() {
        let (service, _) = scripted(ClassifierVerdict {
            has_profanity: true,
            words: vec!["shit".to_string()],
            confidence: 0.79,
        });
        let classifier = SemanticClassifier::new(Some(service), &config(0.8, 0));

        let verdict = classifier.evaluate("some text").await;
        assert_eq!(verdict, ClassifierVerdict::no_signal());
        assert!(verdict.words.is_empty());
    }

    #[tokio::test]
    async fn test_confidence_gate_accepts_above_threshold() {
        let (service, _) = scripted(ClassifierVerdict {
            has_profanity: true,
            words: vec!["shit".to_string()],
            confidence: 0.92,
        });
        let classifier = SemanticClassifier::new(Some(service), &config(0.8, 0));

        let verdict = classifier.evaluate("some text").await;
        assert!(verdict.has_profanity);
        assert_eq!(verdict.words, vec!["shit"]);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_no_signal() {
        let classifier =
            SemanticClassifier::new(Some(Box::new(FailingClassifier)), &config(0.8, 0));
        assert_eq!(
            classifier.evaluate("anything").await,
            ClassifierVerdict::no_signal()
        );
    }

    #[tokio::test]
    async fn test_dispatch_gate() {
        let (service, _) = scripted(ClassifierVerdict::no_signal());
        let classifier = SemanticClassifier::new(Some(service), &config(0.8, 0));

        assert!(classifier.should_classify("long clean sentence with many words", true));
        assert!(!classifier.should_classify("long clean sentence with many words", false));
        assert!(classifier.should_classify("oh no", false));

        let disabled = SemanticClassifier::new(None, &config(0.8, 0));
        assert!(!disabled.should_classify("oh no", false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spacing() {
        let limiter = RateLimiter::new(Duration::from_secs(2));

        let t0 = Instant::now();
        limiter.acquire().await;
        let first = t0.elapsed();

        limiter.acquire().await;
        let second = t0.elapsed();

        limiter.acquire().await;
        let third = t0.elapsed();

        // First dispatch is immediate; each subsequent one is spaced by the
        // full interval.
        assert_eq!(first, Duration::ZERO);
        assert!(second >= Duration::from_secs(2));
        assert!(third >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_not_bypassable_concurrently() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(2)));

        let a = limiter.clone();
        let b = limiter.clone();
        let t0 = Instant::now();

        let (ra, rb) = tokio::join!(
            async move {
                a.acquire().await;
                t0.elapsed()
            },
            async move {
                b.acquire().await;
                t0.elapsed()
            }
        );

        let (early, late) = if ra < rb { (ra, rb) } else { (rb, ra) };
        assert_eq!(early, Duration::ZERO);
        assert!(late >= Duration::from_secs(2));
    }
}

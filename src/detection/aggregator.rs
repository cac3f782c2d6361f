use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::classifier::ClassifierVerdict;
use super::{format_time, MuteWindow};
use crate::transcription::Segment;

/// A flagged segment kept for operator review: which terms fired and on
/// what text. Provenance stays one-to-one with mute windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedSegment {
    pub start: f64,
    pub end: f64,
    pub words: Vec<String>,
    pub text: String,
    pub needs_review: bool,
}

/// Merges lexical and semantic detections per segment into mute windows.
/// Segments are fed strictly in transcription order, so the accumulated
/// window list is time-ordered by construction. Adjacent or contiguous
/// windows are never coalesced; overlap is the renderer's concern.
#[derive(Debug, Default)]
pub struct DetectionAggregator {
    windows: Vec<MuteWindow>,
    flagged: Vec<FlaggedSegment>,
}

impl DetectionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine both detection sources for one segment. Emits exactly one
    /// window spanning the full segment when any confirmed term remains
    /// after case-insensitive deduplication; nothing otherwise.
    pub fn aggregate(
        &mut self,
        segment: &Segment,
        lexical_words: &BTreeSet<String>,
        verdict: &ClassifierVerdict,
    ) -> Option<MuteWindow> {
        // Real transcription output occasionally contains zero-length or
        // inverted segments; a window built from one would violate the
        // start < end contract downstream. Tolerate them by skipping.
        if segment.end <= segment.start || segment.start < 0.0 {
            warn!(
                "Skipping degenerate segment [{}, {}): \"{}\"",
                segment.start, segment.end, segment.text
            );
            return None;
        }

        let mut seen = BTreeSet::new();
        let mut words = Vec::new();

        for word in lexical_words.iter().map(String::as_str).chain(
            verdict.words.iter().map(String::as_str),
        ) {
            let key = word.to_lowercase();
            if seen.insert(key) {
                words.push(word.to_string());
            }
        }

        if words.is_empty() {
            return None;
        }

        let window = MuteWindow {
            start: segment.start,
            end: segment.end,
        };

        info!(
            "🚨 FLAGGED {}-{}: [{}]",
            format_time(window.start),
            format_time(window.end),
            words.join(", ")
        );

        self.flagged.push(FlaggedSegment {
            start: segment.start,
            end: segment.end,
            words,
            text: segment.text.clone(),
            needs_review: segment.needs_review,
        });
        self.windows.push(window);

        Some(window)
    }

    pub fn windows(&self) -> &[MuteWindow] {
        &self.windows
    }

    pub fn flagged_segments(&self) -> &[FlaggedSegment] {
        &self.flagged
    }

    pub fn total_muted_duration(&self) -> f64 {
        self.windows.iter().map(|w| w.duration()).sum()
    }

    pub fn total_word_count(&self) -> usize {
        self.flagged.iter().map(|f| f.words.len()).sum()
    }

    /// Human-readable summary of everything that will be muted. Purely
    /// observable output for the operator; downstream logic never reads it.
    pub fn print_summary(&self) {
        info!(
            "📊 SUMMARY: Found {} inappropriate words in {} segments",
            self.total_word_count(),
            self.flagged.len()
        );

        if self.flagged.is_empty() {
            return;
        }

        info!("📝 Segments that will be MUTED:");
        for (i, item) in self.flagged.iter().enumerate() {
            info!(
                "{}. {}-{}: [{}]",
                i + 1,
                format_time(item.start),
                format_time(item.end),
                item.words.join(", ")
            );
            info!("   Text: \"{}\"", item.text);
        }

        info!(
            "⚠️ Total video time to be muted: {:.2} seconds",
            self.total_muted_duration()
        );
    }
}

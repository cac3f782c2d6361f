pub mod wordlist;
pub mod classifier;
pub mod aggregator;

pub use wordlist::{CompiledMatcher, ScriptFamily, WordList};

use serde::{Deserialize, Serialize};

/// A confirmed time interval to be silenced in the output audio.
/// Always `start < end`; exactly one window per flagged segment and
/// never wider than the segment that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MuteWindow {
    pub start: f64,
    pub end: f64,
}

impl MuteWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Windows with inverted or negative bounds are an upstream contract
    /// violation; the renderer refuses them rather than clamping.
    pub fn is_valid(&self) -> bool {
        self.start >= 0.0 && self.start < self.end
    }
}

/// Format seconds as `m:ss.ss` for operator-facing output
pub fn format_time(seconds: f64) -> String {
    let mins = (seconds / 60.0).floor() as u64;
    let secs = seconds % 60.0;
    format!("{}:{:05.2}", mins, secs)
}

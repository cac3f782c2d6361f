use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

use crate::detection::MuteWindow;

/// Capability interface for rendering the output media. Production
/// implementation shells out to ffmpeg; tests substitute a recording fake.
#[async_trait]
pub trait RenderingService: Send + Sync {
    /// Produce `output` from `source` with every window's audio silenced.
    /// An empty window list must still yield a faithful copy of the source.
    async fn render(&self, source: &Path, windows: &[MuteWindow], output: &Path) -> Result<()>;
}

/// Build the ffmpeg volume-filter expression that zeroes gain inside every
/// window. `between(t,a,b)` terms are summed, so overlapping windows compose
/// as a union of the covered time rather than double-processing.
pub fn build_volume_filter(windows: &[MuteWindow]) -> String {
    let conditions = windows
        .iter()
        .map(|w| format!("between(t,{},{})", w.start, w.end))
        .collect::<Vec<_>>()
        .join("+");

    format!("[0:a]volume=enable='{}':volume=0[a]", conditions)
}

/// Reject windows that violate the upstream contract before any ffmpeg
/// invocation. Inverted or negative bounds are a bug in the caller, not
/// something to clamp quietly.
pub fn validate_windows(windows: &[MuteWindow]) -> Result<()> {
    for w in windows {
        if !w.is_valid() {
            return Err(anyhow!(
                "Invalid mute window [{}, {}): start must be >= 0 and < end",
                w.start,
                w.end
            ));
        }
    }
    Ok(())
}

/// FFmpeg-based timeline muter. Video passes through stream-copied; only the
/// audio track is re-encoded.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer;

impl FfmpegRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Remove the audio track entirely, leaving the video stream untouched
    pub async fn strip_audio(&self, source: &Path, output: &Path) -> Result<()> {
        info!("🔇 Removing audio track from: {}", source.display());

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i", source.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
                "-c:v", "copy",
                "-an",
                "-y",
                output.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
            ])
            .status()
            .await?;

        if !status.success() {
            remove_partial_output(output).await;
            return Err(anyhow!("Audio removal failed for {}", source.display()));
        }

        info!("✅ Audio removed: {}", output.display());
        Ok(())
    }
}

async fn remove_partial_output(output: &Path) {
    if output.exists() {
        if let Err(e) = tokio::fs::remove_file(output).await {
            warn!("Failed to remove partial output {}: {}", output.display(), e);
        }
    }
}

#[async_trait]
impl RenderingService for FfmpegRenderer {
    async fn render(&self, source: &Path, windows: &[MuteWindow], output: &Path) -> Result<()> {
        validate_windows(windows)?;

        if windows.is_empty() {
            info!("✅ No segments to mute - copying original video");
            tokio::fs::copy(source, output).await?;
            return Ok(());
        }

        info!("🎬 Creating video with {} muted segments...", windows.len());

        let audio_filter = build_volume_filter(windows);

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i", source.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
                "-filter_complex", &audio_filter,
                "-map", "0:v",
                "-map", "[a]",
                "-c:v", "copy", // Video stream passes through untouched
                "-c:a", "aac",
                "-y",
                output.to_str().ok_or_else(|| anyhow!("Non-UTF8 path"))?,
            ])
            .status()
            .await?;

        if !status.success() {
            remove_partial_output(output).await;
            return Err(anyhow!("Video rendering failed for {}", source.display()));
        }

        info!("✅ Video processing completed: {}", output.display());
        Ok(())
    }
}

/// Parse a human time value in seconds (`"90"`, `"90.5"`) or
/// minutes:seconds (`"1:30"`) form
pub fn parse_time(input: &str) -> Result<f64> {
    let input = input.trim();

    if let Some((mins, secs)) = input.split_once(':') {
        let mins: f64 = mins
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid minutes in time: {}", input))?;
        let secs: f64 = secs
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid seconds in time: {}", input))?;
        if mins < 0.0 || secs < 0.0 || secs >= 60.0 {
            return Err(anyhow!("Time out of range: {}", input));
        }
        Ok(mins * 60.0 + secs)
    } else {
        let secs: f64 = input
            .parse()
            .map_err(|_| anyhow!("Invalid time: {}", input))?;
        if secs < 0.0 {
            return Err(anyhow!("Time must not be negative: {}", input));
        }
        Ok(secs)
    }
}

/// Parse an operator-supplied `start-end` range (e.g. `"10-20"` or
/// `"1:30-2:45"`) into a mute window
pub fn parse_time_range(input: &str) -> Result<MuteWindow> {
    let parts: Vec<&str> = input.trim().split('-').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(anyhow!(
            "Range format should be: start-end (e.g., \"10-20\" or \"1:30-2:45\")"
        ));
    }

    let start = parse_time(parts[0])?;
    let end = parse_time(parts[1])?;

    if start >= end {
        return Err(anyhow!("Start time must be less than end time"));
    }

    Ok(MuteWindow { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_volume_filter_single_window() {
        let filter = build_volume_filter(&[MuteWindow { start: 12.0, end: 15.5 }]);
        assert_eq!(filter, "[0:a]volume=enable='between(t,12,15.5)':volume=0[a]");
    }

    #[test]
    fn test_volume_filter_overlapping_windows_union() {
        // Overlapping windows are summed into one enable expression, so the
        // whole union [5, 12) is muted with no double-processing.
        let filter = build_volume_filter(&[
            MuteWindow { start: 5.0, end: 10.0 },
            MuteWindow { start: 8.0, end: 12.0 },
        ]);
        assert_eq!(
            filter,
            "[0:a]volume=enable='between(t,5,10)+between(t,8,12)':volume=0[a]"
        );
    }

    #[test]
    fn test_validate_windows_rejects_inverted() {
        assert!(validate_windows(&[MuteWindow { start: 5.0, end: 5.0 }]).is_err());
        assert!(validate_windows(&[MuteWindow { start: 6.0, end: 5.0 }]).is_err());
        assert!(validate_windows(&[MuteWindow { start: -1.0, end: 5.0 }]).is_err());
        assert!(validate_windows(&[MuteWindow { start: 0.0, end: 5.0 }]).is_ok());
        assert!(validate_windows(&[]).is_ok());
    }

    #[tokio::test]
    async fn test_render_empty_windows_copies_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("clip.mp4");
        let output = temp_dir.path().join("clip_clean.mp4");
        tokio::fs::write(&source, b"mock video bytes").await.unwrap();

        let renderer = FfmpegRenderer::new();
        renderer.render(&source, &[], &output).await.unwrap();

        let original = tokio::fs::read(&source).await.unwrap();
        let copied = tokio::fs::read(&output).await.unwrap();
        assert_eq!(original, copied);
    }

    #[tokio::test]
    async fn test_render_rejects_invalid_windows_before_spawning() {
        let renderer = FfmpegRenderer::new();
        let result = renderer
            .render(
                Path::new("/nonexistent.mp4"),
                &[MuteWindow { start: 9.0, end: 3.0 }],
                Path::new("/nonexistent_clean.mp4"),
            )
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid mute window"));
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("90").unwrap(), 90.0);
        assert_eq!(parse_time("90.5").unwrap(), 90.5);
        assert_eq!(parse_time("1:30").unwrap(), 90.0);
        assert_eq!(parse_time("2:45.5").unwrap(), 165.5);
        assert!(parse_time("1:75").is_err());
        assert!(parse_time("-5").is_err());
        assert!(parse_time("abc").is_err());
    }

    #[test]
    fn test_parse_time_range() {
        assert_eq!(
            parse_time_range("10-20").unwrap(),
            MuteWindow { start: 10.0, end: 20.0 }
        );
        assert_eq!(
            parse_time_range("1:30 - 2:45").unwrap(),
            MuteWindow { start: 90.0, end: 165.0 }
        );
        assert!(parse_time_range("20-10").is_err());
        assert!(parse_time_range("10").is_err());
    }
}

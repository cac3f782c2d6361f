use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, warn};

mod video;
mod audio;
mod transcription;
mod detection;
mod muter;
mod pipeline;
mod config;

use crate::config::Config;
use crate::detection::MuteWindow;
use crate::muter::{parse_time_range, FfmpegRenderer, RenderingService};
use crate::pipeline::Pipeline;
use crate::video::VideoProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Profanity Muter (Rust)")
        .version("0.1.0")
        .about("Conservative profanity muter - silences only explicit speech segments")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("Video file to process")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file path (default: <input>_clean.<ext>)"),
        )
        .arg(
            Arg::new("words")
                .short('w')
                .long("words")
                .value_name("TERMS")
                .help("Comma-separated custom terms to filter"),
        )
        .arg(
            Arg::new("language")
                .short('l')
                .long("language")
                .value_name("LANG")
                .help("Language hint for transcription (default: auto-detect)"),
        )
        .arg(
            Arg::new("mute-ranges")
                .long("mute-ranges")
                .value_name("RANGES")
                .help("Mute fixed time ranges without detection (e.g. \"10-20,1:30-2:45\")"),
        )
        .arg(
            Arg::new("strip-audio")
                .long("strip-audio")
                .help("Remove the audio track entirely")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .help("Skip the confirmation prompt before rendering")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let input = PathBuf::from(matches.get_one::<String>("input").unwrap());
    let skip_confirm = matches.get_flag("yes");

    // Config comes first so its log level can seed the tracing filter;
    // RUST_LOG still wins when set.
    let (mut config, config_err) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.env_filter().into()),
        )
        .init();

    if let Some(e) = config_err {
        warn!("Failed to load config, using defaults: {}", e);
    }
    info!("{}", config.summary());

    // ffmpeg/ffprobe are required for every mode; fail before any stage runs
    if let Err(e) = VideoProcessor::check_dependencies().await {
        error!("❌ {}", e);
        error!("Visit: https://ffmpeg.org/download.html");
        return Err(e);
    }

    if let Some(words) = matches.get_one::<String>("words") {
        let terms: Vec<String> = words
            .split(',')
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        info!("✓ Added {} custom words", terms.len());
        config.detection.custom_terms = terms;
    }

    if let Some(lang) = matches.get_one::<String>("language") {
        config.transcription.language = Some(lang.clone());
    }

    let processor = VideoProcessor::new(config.processing.supported_extensions.clone());
    processor.validate_source(&input)?;

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| processor.default_output_path(&input, &config.output.output_suffix));

    // Manual modes bypass detection entirely
    if matches.get_flag("strip-audio") {
        let renderer = FfmpegRenderer::new();
        renderer.strip_audio(&input, &output).await?;
        info!("📁 Output saved to: {}", output.display());
        return Ok(());
    }

    if let Some(ranges) = matches.get_one::<String>("mute-ranges") {
        let windows = ranges
            .split(',')
            .map(parse_time_range)
            .collect::<Result<Vec<MuteWindow>>>()?;

        info!("🔇 Muting {} manual time ranges", windows.len());
        let renderer = FfmpegRenderer::new();
        renderer.render(&input, &windows, &output).await?;
        info!("📁 Output saved to: {}", output.display());
        return Ok(());
    }

    info!("🤖 CONSERVATIVE Profanity Muter - Only Explicit Content");
    info!("🔒 STRICT MODE: Only mutes obvious profanity/vulgar language");

    let pipeline = Pipeline::new(config)?;

    let outcome = pipeline.detect(&input).await?;

    if outcome.degraded_mode {
        warn!("⚠️ Transcription was unavailable - every segment needs manual review");
    }

    if !outcome.windows.is_empty() && !skip_confirm && !confirm_render(outcome.windows.len())? {
        info!("Aborted by operator, no output written");
        return Ok(());
    }

    pipeline.render(&input, &outcome.windows, &output).await?;

    info!("🎉 Process completed!");
    info!("📁 Clean video saved to: {}", output.display());
    info!(
        "🔇 Muted {} segments ({:.2}s) with explicit content only",
        outcome.windows.len(),
        outcome.total_muted_duration
    );

    Ok(())
}

/// Confirmation gate before rendering. Reads a single y/N answer from stdin.
fn confirm_render(window_count: usize) -> Result<bool> {
    print!("🎬 Mute {} segments and render output? (y/N): ", window_count);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .map_err(|e| anyhow!("Failed to read confirmation: {}", e))?;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

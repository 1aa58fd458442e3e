use anyhow::{Context, Result};
use clap::Parser;
use kikitori_pipeline::config;
use kikitori_pipeline::orchestrator::Pipeline;
use kikitori_pipeline::summary::{self, GeminiSummarizer};
use kikitori_pipeline::transcription::WhisperEngine;
use shared::PipelineStatus;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kikitori")]
#[command(about = "Batch transcription of long recordings with a daily summary")]
struct Cli {
    /// Audio file to transcribe (absolute path)
    audio: PathBuf,

    /// Directory for transcript output (default: config, then the audio file's directory)
    #[arg(long)]
    transcription_dir: Option<PathBuf>,

    /// Directory for the daily summary (default: config, then the transcription directory)
    #[arg(long)]
    summary_dir: Option<PathBuf>,

    /// Config file (default: the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the segment length in seconds
    #[arg(long)]
    segment_length: Option<f64>,

    /// Skip the summary step
    #[arg(long)]
    no_summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(length) = cli.segment_length {
        config.pipeline.segment_length_seconds = length;
    }

    if !cli.audio.is_absolute() {
        anyhow::bail!("audio path must be absolute: {}", cli.audio.display());
    }
    if !cli.audio.exists() {
        anyhow::bail!("audio file not found: {}", cli.audio.display());
    }

    let transcription_dir = cli
        .transcription_dir
        .or_else(|| config.output.transcription_dir.clone())
        .or_else(|| cli.audio.parent().map(|p| p.to_path_buf()))
        .context("could not determine a transcription output directory")?;

    let mut engine = WhisperEngine::from_config(&config.whisper, &config.timeouts)?;
    engine.load_model().await?;

    let mut pipeline = Pipeline::new(config.clone(), engine);
    let outcome = pipeline.run(&cli.audio, &transcription_dir).await?;

    match outcome.status {
        PipelineStatus::Complete => {
            info!(
                "Transcription finished ({} segments)",
                outcome.segments_total
            );
        }
        PipelineStatus::Partial => {
            warn!(
                "Transcription finished with {} of {} segments missing",
                outcome.segments_failed, outcome.segments_total
            );
        }
    }
    println!("{}", outcome.transcript_path.display());

    if cli.no_summary || !config.summary.enabled {
        return Ok(());
    }

    let api_key = config
        .summary
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok());
    let api_key = match api_key {
        Some(key) => key,
        None => {
            warn!("No Gemini API key configured, skipping summary");
            return Ok(());
        }
    };

    let summary_dir = cli
        .summary_dir
        .or_else(|| config.output.summary_dir.clone())
        .unwrap_or_else(|| transcription_dir.clone());

    let summarizer = GeminiSummarizer::new(
        api_key,
        config.summary.model.clone(),
        Duration::from_secs(config.timeouts.summary_timeout_seconds),
    );

    // A failed summary never invalidates the finished transcript.
    match summary::compose_summary(&summarizer, &outcome.transcript_path, &summary_dir).await {
        Ok(Some(path)) => println!("{}", path.display()),
        Ok(None) => warn!("No summary produced"),
        Err(e) => warn!("Summary generation failed: {:#}", e),
    }

    Ok(())
}

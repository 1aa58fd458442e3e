use crate::checkpoint::Checkpoint;
use crate::segmenter::Segment;
use crate::timestamp;
use crate::transcription::Transcriber;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use shared::PipelineError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub fn segment_transcript_path(output_dir: &Path, base_name: &str, index: usize) -> PathBuf {
    output_dir.join(format!("{}_part{}_transcription.txt", base_name, index + 1))
}

pub fn checkpoint_path(output_dir: &Path, base_name: &str, index: usize) -> PathBuf {
    output_dir.join(format!("{}_part{}_result.json", base_name, index + 1))
}

/// Drive one segment end-to-end: transcribe, checkpoint the raw result,
/// normalize timestamps, write the per-segment transcript, drop the
/// checkpoint.
///
/// Failure isolation: any error is logged and turns into `None` so that
/// one bad segment never stops the others. When a checkpoint was already
/// written, its path is reported for manual recovery.
pub async fn process_segment<T: Transcriber>(
    engine: &mut T,
    segment: &Segment,
    base_name: &str,
    base_datetime: Option<NaiveDateTime>,
    output_dir: &Path,
) -> Option<PathBuf> {
    info!(
        "Transcribing segment {} ({})",
        segment.index + 1,
        segment.path.display()
    );

    match run_segment(engine, segment, base_name, base_datetime, output_dir).await {
        Ok(path) => Some(path),
        Err(e) => {
            error!("Segment {} failed: {:#}", segment.index + 1, e);
            let checkpoint = checkpoint_path(output_dir, base_name, segment.index);
            if checkpoint.exists() {
                error!(
                    "Raw transcription kept for recovery at {}",
                    checkpoint.display()
                );
            }
            None
        }
    }
}

async fn run_segment<T: Transcriber>(
    engine: &mut T,
    segment: &Segment,
    base_name: &str,
    base_datetime: Option<NaiveDateTime>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let chunks = engine.transcribe(&segment.path).await.map_err(|e| {
        PipelineError::Transcription {
            index: segment.index,
            reason: format!("{:#}", e),
        }
    })?;

    let checkpoint = Checkpoint::store(
        checkpoint_path(output_dir, base_name, segment.index),
        &chunks,
    )?;

    let lines = timestamp::normalize_chunks(chunks, segment.offset_seconds);
    let rendered = timestamp::render_transcript(&lines, base_datetime);

    let out_path = segment_transcript_path(output_dir, base_name, segment.index);
    fs::write(&out_path, rendered)
        .with_context(|| format!("failed to write transcript {}", out_path.display()))?;

    checkpoint.remove();
    info!(
        "Segment {} transcript written to {}",
        segment.index + 1,
        out_path.display()
    );
    Ok(out_path)
}

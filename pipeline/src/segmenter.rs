use crate::config::TimeoutsConfig;
use crate::ffmpeg;
use anyhow::Result;
use shared::PipelineError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One slice of the source recording, addressed by its position in the
/// original timeline. `offset_seconds` is `index * segment_length`, fixed
/// at split time so downstream timestamp alignment is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub path: PathBuf,
    pub offset_seconds: f64,
}

impl Segment {
    /// The whole recording as a single segment at offset zero, used when no
    /// split happens. Downstream behavior is identical to a real split with
    /// one segment.
    pub fn whole(path: &Path) -> Self {
        Self {
            index: 0,
            path: path.to_path_buf(),
            offset_seconds: 0.0,
        }
    }
}

/// Ephemeral directory owning the segment files produced by a split.
///
/// Invariant: cleanup only ever deletes paths rooted under this directory,
/// so the caller's original file can never be removed by accident.
#[derive(Debug)]
pub struct ScratchSpace {
    root: PathBuf,
}

impl ScratchSpace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("kikitori-segments-")
            .tempdir()?;
        Ok(Self {
            root: dir.into_path(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Best-effort removal of segment files and the directory itself.
    /// Paths outside the scratch directory are skipped; failures are logged
    /// and never escalated.
    pub fn cleanup(self, segment_paths: &[PathBuf]) {
        for path in segment_paths {
            if !self.owns(path) {
                debug!("Skipping cleanup of {} (not scratch-owned)", path.display());
                continue;
            }
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove segment file {}: {}", path.display(), e);
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!(
                "Could not remove scratch directory {}: {}",
                self.root.display(),
                e
            );
        } else {
            debug!("Removed scratch directory {}", self.root.display());
        }
    }
}

/// Split an audio file into fixed-length segments when its duration
/// exceeds `segment_length_seconds`.
///
/// Best-effort by design: a missing tool, a failed probe, or a failed
/// scratch-dir creation all degrade to transcribing the file unsplit, and a
/// failed individual extraction drops that segment while the rest proceed.
/// The scratch directory is surfaced to the caller even when the split
/// falls back, so partially created files still get cleaned up.
pub async fn split_audio(
    audio_path: &Path,
    segment_length_seconds: f64,
    timeouts: &TimeoutsConfig,
) -> (Vec<Segment>, Option<ScratchSpace>) {
    if !ffmpeg::is_available().await {
        warn!(
            "{}, transcribing without segmentation",
            PipelineError::ToolUnavailable
        );
        return (vec![Segment::whole(audio_path)], None);
    }

    let duration = ffmpeg::probe_duration(
        audio_path,
        Duration::from_secs(timeouts.probe_timeout_seconds),
    )
    .await;

    if duration <= segment_length_seconds {
        debug!(
            "Duration {:.1}s is within one segment length, no split needed",
            duration
        );
        return (vec![Segment::whole(audio_path)], None);
    }

    let scratch = match ScratchSpace::create() {
        Ok(scratch) => scratch,
        Err(e) => {
            warn!(
                "Could not create scratch directory ({}), transcribing without segmentation",
                e
            );
            return (vec![Segment::whole(audio_path)], None);
        }
    };

    let segment_count = segment_count(duration, segment_length_seconds);
    info!(
        "Splitting {} into {} segments of {:.1} min each",
        audio_path.display(),
        segment_count,
        segment_length_seconds / 60.0
    );

    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let ext = audio_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let extract_budget = Duration::from_secs(timeouts.extract_timeout_seconds);
    let mut segments = Vec::new();

    for i in 0..segment_count {
        let start = i as f64 * segment_length_seconds;
        let segment_path = scratch.root().join(segment_file_name(&stem, &ext, i));

        match ffmpeg::extract_segment(
            audio_path,
            &segment_path,
            start,
            segment_length_seconds,
            extract_budget,
        )
        .await
        {
            Ok(()) if has_content(&segment_path) => {
                info!(
                    "Segment {}/{} written to {}",
                    i + 1,
                    segment_count,
                    segment_path.display()
                );
                segments.push(Segment {
                    index: i,
                    path: segment_path,
                    offset_seconds: start,
                });
            }
            Ok(()) => {
                warn!("Segment {}/{} came out empty, dropping it", i + 1, segment_count);
            }
            Err(e) => {
                warn!(
                    "{}",
                    PipelineError::Extraction {
                        index: i,
                        reason: e.to_string(),
                    }
                );
            }
        }
    }

    if segments.is_empty() {
        warn!(
            "No segment survived the split, transcribing {} unsplit",
            audio_path.display()
        );
        return (vec![Segment::whole(audio_path)], Some(scratch));
    }

    (segments, Some(scratch))
}

fn segment_count(duration: f64, segment_length: f64) -> usize {
    (duration / segment_length).ceil() as usize
}

fn segment_file_name(stem: &str, ext: &str, index: usize) -> String {
    format!("{}_part{}{}", stem, index + 1, ext)
}

fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

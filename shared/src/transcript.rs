use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// One timed text chunk as produced by a transcription engine.
///
/// Timestamps are seconds relative to the start of the transcribed file and
/// may be absent; consumers skip chunks with a missing start or end rather
/// than defaulting them to zero.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub text: String,
    #[serde(default)]
    pub speaker_id: Option<String>,
}

impl TranscriptChunk {
    pub fn has_timestamps(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// A chunk re-aligned onto the absolute timeline of the source recording.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
    pub speaker_id: Option<String>,
}

/// Whether a pipeline run transcribed every segment or had to drop some.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Complete,
    Partial,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("ffmpeg is not installed or not on PATH")]
    ToolUnavailable,

    #[error("could not probe duration of {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("failed to extract segment {index}: {reason}")]
    Extraction { index: usize, reason: String },

    #[error("transcription of segment {index} failed: {reason}")]
    Transcription { index: usize, reason: String },

    #[error("no segment produced a usable transcript")]
    NoUsableSegments,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

use crate::config::Config;
use crate::processor;
use crate::segmenter;
use crate::timestamp;
use crate::transcription::Transcriber;
use anyhow::{Context, Result};
use shared::{PipelineError, PipelineStatus};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pipeline phases in execution order. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Segmenting,
    Processing,
    Merging,
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Init => "init",
            Self::Segmenting => "segmenting",
            Self::Processing => "processing",
            Self::Merging => "merging",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub transcript_path: PathBuf,
    pub status: PipelineStatus,
    pub segments_total: usize,
    pub segments_failed: usize,
}

/// Sequences one audio file through segmentation, per-segment
/// transcription, merge and cleanup. Segments run sequentially in index
/// order; merge order is index order, never completion order.
pub struct Pipeline<T: Transcriber> {
    config: Config,
    engine: T,
    state: PipelineState,
}

impl<T: Transcriber> Pipeline<T> {
    pub fn new(config: Config, engine: T) -> Self {
        Self {
            config,
            engine,
            state: PipelineState::Init,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the pipeline for one audio file. The returned path is only
    /// produced after the final transcript write is confirmed.
    pub async fn run(&mut self, audio_path: &Path, output_dir: &Path) -> Result<PipelineOutcome> {
        match self.run_inner(audio_path, output_dir).await {
            Ok(outcome) => {
                self.transition(PipelineState::Done);
                Ok(outcome)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                Err(e)
            }
        }
    }

    async fn run_inner(&mut self, audio_path: &Path, output_dir: &Path) -> Result<PipelineOutcome> {
        let base_name = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                anyhow::anyhow!("audio path has no file name: {}", audio_path.display())
            })?;
        let base_datetime = timestamp::extract_base_datetime(&base_name);
        if base_datetime.is_none() {
            debug!("No date prefix in {:?}, using elapsed timestamps", base_name);
        }

        fs::create_dir_all(output_dir)
            .with_context(|| format!("could not create output dir {}", output_dir.display()))?;

        self.transition(PipelineState::Segmenting);
        let (segments, scratch) = segmenter::split_audio(
            audio_path,
            self.config.pipeline.segment_length_seconds,
            &self.config.timeouts,
        )
        .await;

        self.transition(PipelineState::Processing);
        let mut outputs = Vec::new();
        for segment in &segments {
            let output = processor::process_segment(
                &mut self.engine,
                segment,
                &base_name,
                base_datetime,
                output_dir,
            )
            .await;
            if let Some(path) = output {
                outputs.push(path);
            }
        }
        let segments_failed = segments.len() - outputs.len();

        self.transition(PipelineState::Merging);
        let final_path = output_dir.join(format!("{}_transcription.txt", base_name));
        let merge_result = merge_transcripts(&outputs, &final_path);

        // Every scratch file is accounted for once processing ends, so
        // cleanup runs even when the merge failed.
        self.transition(PipelineState::Cleanup);
        if let Some(scratch) = scratch {
            let segment_paths: Vec<PathBuf> =
                segments.iter().map(|s| s.path.clone()).collect();
            scratch.cleanup(&segment_paths);
        }

        merge_result?;
        info!("Transcript written to {}", final_path.display());

        let status = if segments_failed == 0 {
            PipelineStatus::Complete
        } else {
            warn!(
                "{} of {} segments produced no transcript",
                segments_failed,
                segments.len()
            );
            PipelineStatus::Partial
        };

        Ok(PipelineOutcome {
            transcript_path: final_path,
            status,
            segments_total: segments.len(),
            segments_failed,
        })
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Merge per-segment transcripts into `final_path`, in the order given.
///
/// Zero inputs is fatal (there is nothing to write). A single input is
/// renamed rather than copied. Multiple inputs are concatenated verbatim
/// (each already ends with a newline), then the per-segment files are
/// removed.
pub fn merge_transcripts(outputs: &[PathBuf], final_path: &Path) -> Result<()> {
    match outputs {
        [] => Err(PipelineError::NoUsableSegments.into()),
        [single] => {
            if single != final_path {
                fs::rename(single, final_path).with_context(|| {
                    format!(
                        "could not move {} to {}",
                        single.display(),
                        final_path.display()
                    )
                })?;
            }
            Ok(())
        }
        many => {
            let mut merged = String::new();
            for path in many {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("could not read {}", path.display()))?;
                merged.push_str(&content);
            }
            fs::write(final_path, merged)
                .with_context(|| format!("could not write {}", final_path.display()))?;

            for path in many {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Could not remove merged part {}: {}", path.display(), e);
                }
            }
            Ok(())
        }
    }
}

pub mod transcript;

pub use transcript::{PipelineError, PipelineStatus, TranscriptChunk, TranscriptLine};

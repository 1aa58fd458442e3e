pub mod checkpoint;
pub mod config;
pub mod ffmpeg;
pub mod orchestrator;
pub mod processor;
pub mod segmenter;
pub mod summary;
pub mod timestamp;
pub mod transcription;

pub use config::Config;
pub use orchestrator::{Pipeline, PipelineOutcome};
pub use summary::{GeminiSummarizer, Summarizer};
pub use transcription::{Transcriber, WhisperEngine};

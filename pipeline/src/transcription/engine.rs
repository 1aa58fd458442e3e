use super::{model, strip_punctuation, Transcriber};
use crate::config::{TimeoutsConfig, WhisperConfig};
use crate::ffmpeg;
use anyhow::Result;
use shared::TranscriptChunk;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper-backed transcription engine.
///
/// Wraps model provisioning, backend selection and per-file inference.
/// Audio is decoded to 16 kHz mono PCM through ffmpeg, so the on-disk
/// container format never matters here.
pub struct WhisperEngine {
    context: Option<WhisperContext>,
    model_path: PathBuf,
    model_url: String,
    model_checksum: Option<String>,
    backend: String,
    language: String,
    n_threads: i32,
    punctuation: bool,
    diarization: bool,
    decode_budget: Duration,
    download_budget: Duration,
}

impl WhisperEngine {
    pub fn from_config(whisper: &WhisperConfig, timeouts: &TimeoutsConfig) -> Result<Self> {
        let model_path = match &whisper.model_path {
            Some(path) => PathBuf::from(path),
            None => model::find_model_path(&whisper.model_url)?,
        };

        Ok(Self {
            context: None,
            model_path,
            model_url: whisper.model_url.clone(),
            model_checksum: whisper.model_checksum.clone(),
            backend: whisper.backend.clone(),
            language: whisper.language.clone(),
            n_threads: whisper.n_threads,
            punctuation: whisper.punctuation,
            diarization: whisper.diarization,
            decode_budget: Duration::from_secs(timeouts.decode_timeout_seconds),
            download_budget: Duration::from_secs(timeouts.model_download_timeout_seconds),
        })
    }

    /// Provision the model file and load the whisper context. A GPU backend
    /// that fails to initialize falls back to CPU with a warning.
    pub async fn load_model(&mut self) -> Result<()> {
        model::ensure_model(
            &self.model_path,
            &self.model_url,
            self.model_checksum.as_deref(),
            self.download_budget,
        )
        .await?;

        let use_gpu = match self.backend.to_lowercase().as_str() {
            "gpu" | "cuda" => true,
            "cpu" => false,
            other => {
                warn!("Unknown backend {:?}, using CPU. Valid options: cpu, gpu, cuda", other);
                false
            }
        };

        let model_path = self
            .model_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("model path is not valid UTF-8"))?;

        let mut params = WhisperContextParameters::default();
        params.use_gpu(use_gpu);

        let ctx = if use_gpu {
            match WhisperContext::new_with_params(model_path, params) {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!("GPU initialization failed ({}), falling back to CPU", e);
                    let mut cpu_params = WhisperContextParameters::default();
                    cpu_params.use_gpu(false);
                    WhisperContext::new_with_params(model_path, cpu_params)
                        .map_err(|e| anyhow::anyhow!("failed to load whisper model: {}", e))?
                }
            }
        } else {
            WhisperContext::new_with_params(model_path, params)
                .map_err(|e| anyhow::anyhow!("failed to load whisper model: {}", e))?
        };

        self.context = Some(ctx);
        info!("Whisper model loaded from {}", self.model_path.display());
        Ok(())
    }
}

impl Transcriber for WhisperEngine {
    async fn transcribe(&mut self, audio_path: &Path) -> Result<Vec<TranscriptChunk>> {
        let ctx = self
            .context
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("model not loaded"))?;

        let samples = ffmpeg::decode_samples(audio_path, self.decode_budget).await?;
        debug!(
            "Decoded {} samples ({:.1}s) from {}",
            samples.len(),
            samples.len() as f64 / 16000.0,
            audio_path.display()
        );

        let mut state = ctx
            .create_state()
            .map_err(|e| anyhow::anyhow!("failed to create whisper state: {}", e))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_language(Some(&self.language));
        params.set_n_threads(self.n_threads);
        if self.diarization {
            params.set_tdrz_enable(true);
        }

        state
            .full(params, &samples)
            .map_err(|e| anyhow::anyhow!("transcription failed: {}", e))?;

        let num_segments = state.full_n_segments();
        let mut chunks = Vec::new();
        let mut speaker = 1u32;

        for i in 0..num_segments {
            let Some(segment) = state.get_segment(i) else {
                continue;
            };
            let text = match segment.to_str() {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("Skipping segment {} with invalid UTF-8: {}", i, e);
                    continue;
                }
            };
            if text.is_empty() {
                continue;
            }
            let text = if self.punctuation {
                text
            } else {
                strip_punctuation(&text)
            };

            chunks.push(TranscriptChunk {
                start: Some(segment.start_timestamp() as f64 / 100.0),
                end: Some(segment.end_timestamp() as f64 / 100.0),
                text,
                speaker_id: self.diarization.then(|| speaker.to_string()),
            });

            if self.diarization && segment.speaker_turn_next() {
                speaker += 1;
            }
        }

        debug!(
            "Transcribed {} chunks from {}",
            chunks.len(),
            audio_path.display()
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_explicit_model_path() {
        let whisper = WhisperConfig {
            model_path: Some("/models/custom.bin".to_string()),
            ..WhisperConfig::default()
        };
        let engine = WhisperEngine::from_config(&whisper, &TimeoutsConfig::default()).unwrap();

        assert_eq!(engine.model_path, PathBuf::from("/models/custom.bin"));
        assert!(engine.context.is_none());
    }

    #[test]
    fn test_from_config_derives_path_from_url() {
        let whisper = WhisperConfig {
            model_url: "https://example.com/ggml-tiny.bin".to_string(),
            ..WhisperConfig::default()
        };
        let engine = WhisperEngine::from_config(&whisper, &TimeoutsConfig::default()).unwrap();

        assert!(engine
            .model_path
            .to_string_lossy()
            .contains("ggml-tiny.bin"));
    }

    #[test]
    fn test_from_config_carries_flags() {
        let whisper = WhisperConfig {
            punctuation: false,
            diarization: false,
            backend: "gpu".to_string(),
            ..WhisperConfig::default()
        };
        let engine = WhisperEngine::from_config(&whisper, &TimeoutsConfig::default()).unwrap();

        assert!(!engine.punctuation);
        assert!(!engine.diarization);
        assert_eq!(engine.backend, "gpu");
    }

    #[tokio::test]
    async fn test_transcribe_without_loaded_model_is_an_error() {
        let mut engine =
            WhisperEngine::from_config(&WhisperConfig::default(), &TimeoutsConfig::default())
                .unwrap();
        let result = engine.transcribe(Path::new("/audio/a.mp3")).await;
        assert!(result.is_err());
    }
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub whisper: WhisperConfig,
    pub summary: SummaryConfig,
    pub output: OutputConfig,
    pub timeouts: TimeoutsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_segment_length")]
    pub segment_length_seconds: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment_length_seconds: default_segment_length(),
        }
    }
}

fn default_segment_length() -> f64 {
    3600.0
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WhisperConfig {
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default = "default_model_url")]
    pub model_url: String,
    #[serde(default)]
    pub model_checksum: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_n_threads")]
    pub n_threads: i32,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_punctuation")]
    pub punctuation: bool,
    #[serde(default = "default_diarization")]
    pub diarization: bool,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_url: default_model_url(),
            model_checksum: None,
            language: default_language(),
            n_threads: default_n_threads(),
            backend: default_backend(),
            punctuation: default_punctuation(),
            diarization: default_diarization(),
        }
    }
}

fn default_model_url() -> String {
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo.bin".to_string()
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_n_threads() -> i32 {
    4
}

fn default_backend() -> String {
    "cpu".to_string()
}

fn default_punctuation() -> bool {
    true
}

fn default_diarization() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SummaryConfig {
    #[serde(default = "default_summary_enabled")]
    pub enabled: bool,
    #[serde(default = "default_summary_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: default_summary_enabled(),
            model: default_summary_model(),
            api_key: None,
        }
    }
}

fn default_summary_enabled() -> bool {
    true
}

fn default_summary_model() -> String {
    "gemini-2.0-flash".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub transcription_dir: Option<PathBuf>,
    #[serde(default)]
    pub summary_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TimeoutsConfig {
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_seconds: u64,
    #[serde(default = "default_decode_timeout")]
    pub decode_timeout_seconds: u64,
    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_seconds: u64,
    #[serde(default = "default_model_download_timeout")]
    pub model_download_timeout_seconds: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe_timeout_seconds: default_probe_timeout(),
            extract_timeout_seconds: default_extract_timeout(),
            decode_timeout_seconds: default_decode_timeout(),
            summary_timeout_seconds: default_summary_timeout(),
            model_download_timeout_seconds: default_model_download_timeout(),
        }
    }
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_extract_timeout() -> u64 {
    600
}

fn default_decode_timeout() -> u64 {
    600
}

fn default_summary_timeout() -> u64 {
    120
}

fn default_model_download_timeout() -> u64 {
    300
}

/// Load configuration from `override_path`, or from the default location
/// when none is given. A missing default file falls back to defaults; an
/// explicitly named file must exist and parse.
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let config_path = match override_path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_config_path();
            if !path.exists() {
                tracing::info!("Config file not found at {:?}, using defaults", path);
                return Ok(Config::default());
            }
            path
        }
    };

    tracing::info!("Loading config from {:?}", config_path);
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

    Ok(config)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kikitori")
        .join("config.toml")
}

use anyhow::{Context, Result};
use shared::TranscriptChunk;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Recoverable side-store for raw transcription results.
///
/// The raw chunk list is persisted before any rendering happens and removed
/// only after the rendered transcript is safely on disk. A failure in the
/// transform step therefore never loses finished inference work: the
/// serialized chunks stay on disk under a deterministic path for manual
/// recovery.
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn store(path: PathBuf, chunks: &[TranscriptChunk]) -> Result<Self> {
        let json = serde_json::to_vec(chunks)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
        debug!("Checkpoint written to {}", path.display());
        Ok(Self { path })
    }

    pub fn load(path: &Path) -> Result<Vec<TranscriptChunk>> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
        let chunks = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse checkpoint {}", path.display()))?;
        Ok(chunks)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the side-store after the transform succeeded. Failure to
    /// remove is logged only; a stale checkpoint is harmless.
    pub fn remove(self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove checkpoint {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<TranscriptChunk> {
        vec![
            TranscriptChunk {
                start: Some(0.5),
                end: Some(2.0),
                text: "会議を始めます".to_string(),
                speaker_id: Some("1".to_string()),
            },
            TranscriptChunk {
                start: None,
                end: None,
                text: "inaudible".to_string(),
                speaker_id: None,
            },
        ]
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_part1_result.json");

        let chunks = sample_chunks();
        let checkpoint = Checkpoint::store(path.clone(), &chunks).unwrap();
        assert_eq!(checkpoint.path(), path.as_path());
        assert!(path.exists());

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded, chunks);
    }

    #[test]
    fn test_remove_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a_part1_result.json");

        let checkpoint = Checkpoint::store(path.clone(), &sample_chunks()).unwrap();
        checkpoint.remove();
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        assert!(Checkpoint::load(Path::new("/nonexistent/result.json")).is_err());
    }

    #[test]
    fn test_store_into_missing_directory_is_an_error() {
        let result = Checkpoint::store(
            PathBuf::from("/nonexistent/dir/a_result.json"),
            &sample_chunks(),
        );
        assert!(result.is_err());
    }
}

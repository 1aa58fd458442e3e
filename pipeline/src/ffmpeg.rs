use anyhow::Result;
use shared::PipelineError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Check whether ffmpeg can be invoked. Callers check once before
/// attempting segmentation and skip it entirely when the tool is missing.
pub async fn is_available() -> bool {
    match Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

/// Total duration of an audio file in seconds.
///
/// Returns 0.0 on any failure (tool missing, corrupt file, timeout):
/// callers only use the duration to decide whether to segment, so a failed
/// probe degrades to the no-segmentation path instead of aborting.
pub async fn probe_duration(path: &Path, budget: Duration) -> f64 {
    match probe(path, budget).await {
        Ok(seconds) => seconds,
        Err(e) => {
            warn!(
                "{}",
                PipelineError::Probe {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            );
            0.0
        }
    }
}

async fn probe(path: &Path, budget: Duration) -> Result<f64> {
    let output = timeout(
        budget,
        Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("ffprobe timed out after {}s", budget.as_secs()))??;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe exited with {}", output.status));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(stdout: &str) -> Result<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("unparsable ffprobe output {:?}: {}", stdout.trim(), e))
}

/// Stream-copy the slice `[start, start + length)` of `input` into
/// `output`. No re-encoding happens, so slicing is fast and lossless.
pub async fn extract_segment(
    input: &Path,
    output: &Path,
    start_seconds: f64,
    length_seconds: f64,
    budget: Duration,
) -> Result<()> {
    debug!(
        "Extracting [{}s, {}s) of {} into {}",
        start_seconds,
        start_seconds + length_seconds,
        input.display(),
        output.display()
    );

    let status = timeout(
        budget,
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-ss")
            .arg(start_seconds.to_string())
            .arg("-t")
            .arg(length_seconds.to_string())
            .args(["-c", "copy"])
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("ffmpeg timed out after {}s", budget.as_secs()))??;

    if !status.success() {
        return Err(anyhow::anyhow!("ffmpeg exited with {}", status));
    }

    Ok(())
}

/// Decode an audio file to 16 kHz mono f32 samples on stdout, the input
/// format whisper expects.
pub async fn decode_samples(path: &Path, budget: Duration) -> Result<Vec<f32>> {
    let output = timeout(
        budget,
        Command::new("ffmpeg")
            .arg("-i")
            .arg(path)
            .args(["-f", "f32le", "-ac", "1", "-ar", "16000", "pipe:1"])
            .stderr(Stdio::null())
            .output(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("ffmpeg decode timed out after {}s", budget.as_secs()))??;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg decode of {} exited with {}",
            path.display(),
            output.status
        ));
    }

    Ok(samples_from_bytes(&output.stdout))
}

fn samples_from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_plain() {
        assert_eq!(parse_duration("7200.5\n").unwrap(), 7200.5);
    }

    #[test]
    fn test_parse_duration_integral() {
        assert_eq!(parse_duration("3600").unwrap(), 3600.0);
    }

    #[test]
    fn test_parse_duration_garbage() {
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_samples_from_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-1.0f32).to_le_bytes());
        assert_eq!(samples_from_bytes(&bytes), vec![0.5, -1.0]);
    }

    #[test]
    fn test_samples_from_bytes_truncated_tail_is_dropped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        bytes.push(0xff);
        assert_eq!(samples_from_bytes(&bytes), vec![1.0]);
    }

    #[test]
    fn test_samples_from_bytes_empty() {
        assert!(samples_from_bytes(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_probe_duration_of_missing_file_is_zero() {
        let duration = probe_duration(
            Path::new("/nonexistent/audio.mp3"),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(duration, 0.0);
    }
}

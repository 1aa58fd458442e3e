use anyhow::Result;
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Resolve the on-disk location for the model file named by `model_url`,
/// preferring well-known install locations and defaulting to the per-user
/// data directory when the model is not present anywhere yet.
pub fn find_model_path(model_url: &str) -> Result<PathBuf> {
    let file_name = model_file_name(model_url)?;

    let candidates: Vec<PathBuf> = [
        dirs::home_dir().map(|p| p.join(".local/share/kikitori").join(&file_name)),
        Some(PathBuf::from("/usr/share/whisper").join(&file_name)),
        Some(PathBuf::from("./models").join(&file_name)),
        Some(PathBuf::from(&file_name)),
    ]
    .into_iter()
    .flatten()
    .collect();

    for path in candidates {
        if path.exists() {
            info!("Found model at {}", path.display());
            return Ok(path);
        }
    }

    let default_path = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine home directory"))?
        .join(".local/share/kikitori")
        .join(&file_name);
    debug!(
        "Model not found locally, will use {}",
        default_path.display()
    );
    Ok(default_path)
}

fn model_file_name(model_url: &str) -> Result<String> {
    let name = model_url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| anyhow::anyhow!("invalid model URL {:?}: no file name", model_url))?;
    Ok(name.to_string())
}

/// Make sure a usable model file exists at `path`, downloading it from
/// `url` when it is absent or fails checksum verification.
pub async fn ensure_model(
    path: &Path,
    url: &str,
    checksum: Option<&str>,
    download_budget: Duration,
) -> Result<()> {
    if path.exists() {
        match checksum {
            None => return Ok(()),
            Some(expected) => {
                let actual = file_sha256(path)?;
                if actual == expected {
                    debug!("Model checksum verified: {}", actual);
                    return Ok(());
                }
                warn!(
                    "Model checksum mismatch (expected {}, got {}), re-downloading",
                    expected, actual
                );
            }
        }
    } else {
        info!("Model not found at {}, downloading from {}", path.display(), url);
    }

    download_with_retry(path, url, checksum, download_budget).await
}

async fn download_with_retry(
    path: &Path,
    url: &str,
    checksum: Option<&str>,
    budget: Duration,
) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    // Download into a sibling temp file, rename into place only when the
    // content is verified.
    let temp_path = PathBuf::from(format!("{}.partial", path.display()));
    let mut last_error = None;

    for attempt in 1..=MAX_DOWNLOAD_ATTEMPTS {
        match download_once(&temp_path, url, budget).await {
            Ok(()) => {
                if let Some(expected) = checksum {
                    let actual = file_sha256(&temp_path)?;
                    if actual != expected {
                        error!(
                            "Downloaded model failed checksum (expected {}, got {})",
                            expected, actual
                        );
                        let _ = tokio::fs::remove_file(&temp_path).await;
                        last_error = Some(anyhow::anyhow!(
                            "checksum mismatch: expected {}, got {}",
                            expected,
                            actual
                        ));
                        backoff(attempt).await;
                        continue;
                    }
                }
                tokio::fs::rename(&temp_path, path).await?;
                info!("Model ready at {}", path.display());
                return Ok(());
            }
            Err(e) => {
                warn!("Download attempt {}/{} failed: {}", attempt, MAX_DOWNLOAD_ATTEMPTS, e);
                if temp_path.exists() {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                }
                last_error = Some(e);
                backoff(attempt).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        anyhow::anyhow!("model download failed after {} attempts", MAX_DOWNLOAD_ATTEMPTS)
    }))
}

async fn backoff(attempt: u32) {
    if attempt < MAX_DOWNLOAD_ATTEMPTS {
        let delay = Duration::from_millis(1000 * 2_u64.pow(attempt));
        debug!("Waiting {:?} before retry", delay);
        sleep(delay).await;
    }
}

async fn download_once(temp_path: &Path, url: &str, budget: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(budget)
        .connect_timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(anyhow::anyhow!("HTTP error: {}", response.status()));
    }

    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(temp_path).await?;

    loop {
        let next = timeout(Duration::from_secs(30), stream.next())
            .await
            .map_err(|_| anyhow::anyhow!("download stalled for 30 seconds"))?;
        match next {
            Some(chunk) => file.write_all(&chunk?).await?,
            None => break,
        }
    }

    file.flush().await?;
    Ok(())
}

pub fn file_sha256(path: &Path) -> Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

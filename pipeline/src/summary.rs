use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const SUMMARY_PROMPT: &str = "以下は１日の会話の文字起こしです。\
内容を簡潔にまとめた後、翌日以降のタスクになりそうな項目をピックアップしてください。\
返信はmarkdownで、次のフォーマットに従ってください。\n\n\
## まとめ\n(まとめの内容)\n\n## タスク\n(タスクの内容)\n";

/// Narrow seam over the summarization backend: transcript file in, markdown
/// out. `None` means the backend produced no usable text; hard failures
/// are errors.
#[allow(async_fn_in_trait)]
pub trait Summarizer {
    async fn summarize(&self, transcript_path: &Path) -> Result<Option<String>>;
}

/// Summarizer backed by the Gemini `generateContent` REST endpoint.
pub struct GeminiSummarizer {
    api_key: String,
    model: String,
    request_budget: Duration,
}

impl GeminiSummarizer {
    pub fn new(api_key: String, model: String, request_budget: Duration) -> Self {
        Self {
            api_key,
            model,
            request_budget,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        )
    }
}

impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, transcript_path: &Path) -> Result<Option<String>> {
        let transcript = fs::read_to_string(transcript_path)
            .with_context(|| format!("could not read transcript {}", transcript_path.display()))?;

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": SUMMARY_PROMPT },
                    { "text": transcript },
                ]
            }]
        });

        let client = reqwest::Client::builder()
            .timeout(self.request_budget)
            .build()?;

        info!("Requesting summary from {}", self.model);
        let response = client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "summary request failed with HTTP {}",
                response.status()
            ));
        }

        let payload: Value = response.json().await?;
        Ok(extract_text(&payload))
    }
}

fn extract_text(payload: &Value) -> Option<String> {
    let text = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?;
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Derive the summary file name from the transcript stem. A six-digit
/// `YYMMDD` prefix becomes `20YYMMDD_summary.md`; anything else keeps the
/// stem with the `_transcription` suffix removed.
pub fn summary_file_name(transcript_stem: &str) -> String {
    let re = Regex::new(r"^(\d{6})").unwrap();
    match re.captures(transcript_stem) {
        Some(caps) => format!("20{}_summary.md", &caps[1]),
        None => {
            let stem = transcript_stem
                .strip_suffix("_transcription")
                .unwrap_or(transcript_stem);
            format!("{}_summary.md", stem)
        }
    }
}

/// Generate the daily report: ask the summarizer for markdown and write it
/// under a `#日報` heading into `summary_dir`. Returns `None` when the
/// summarizer produced nothing.
pub async fn compose_summary<S: Summarizer>(
    summarizer: &S,
    transcript_path: &Path,
    summary_dir: &Path,
) -> Result<Option<PathBuf>> {
    let summary = match summarizer.summarize(transcript_path).await? {
        Some(summary) => summary,
        None => {
            warn!("Summarizer returned no text");
            return Ok(None);
        }
    };

    let stem = transcript_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let summary_path = summary_dir.join(summary_file_name(&stem));

    fs::create_dir_all(summary_dir)
        .with_context(|| format!("could not create summary dir {}", summary_dir.display()))?;
    fs::write(&summary_path, format!("#日報\n\n{}", summary))
        .with_context(|| format!("could not write summary {}", summary_path.display()))?;

    info!("Summary written to {}", summary_path.display());
    Ok(Some(summary_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedSummarizer {
        reply: Option<String>,
    }

    impl Summarizer for CannedSummarizer {
        async fn summarize(&self, _transcript_path: &Path) -> Result<Option<String>> {
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_summary_file_name_with_date_prefix() {
        assert_eq!(
            summary_file_name("250514_0738_transcription"),
            "20250514_summary.md"
        );
    }

    #[test]
    fn test_summary_file_name_without_date() {
        assert_eq!(
            summary_file_name("meeting_transcription"),
            "meeting_summary.md"
        );
        assert_eq!(summary_file_name("meeting"), "meeting_summary.md");
    }

    #[test]
    fn test_extract_text_from_gemini_payload() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [{ "text": "## まとめ\n要点" }],
                    "role": "model"
                }
            }]
        });
        assert_eq!(extract_text(&payload), Some("## まとめ\n要点".to_string()));
    }

    #[test]
    fn test_extract_text_missing_candidates() {
        assert_eq!(extract_text(&json!({})), None);
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn test_extract_text_empty_reply_is_none() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "  " }] } }]
        });
        assert_eq!(extract_text(&payload), None);
    }

    #[tokio::test]
    async fn test_compose_summary_writes_daily_report() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("250514_0738_transcription.txt");
        fs::write(&transcript, "[0:00:01 --> 0:00:02] hello\n").unwrap();

        let summarizer = CannedSummarizer {
            reply: Some("## まとめ\n短い一日".to_string()),
        };
        let summary_dir = dir.path().join("summaries");

        let path = compose_summary(&summarizer, &transcript, &summary_dir)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(path, summary_dir.join("20250514_summary.md"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("#日報\n\n"));
        assert!(content.contains("短い一日"));
    }

    #[tokio::test]
    async fn test_compose_summary_with_no_reply_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("meeting_transcription.txt");
        fs::write(&transcript, "line\n").unwrap();

        let summarizer = CannedSummarizer { reply: None };
        let summary_dir = dir.path().join("summaries");

        let result = compose_summary(&summarizer, &transcript, &summary_dir)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(!summary_dir.exists());
    }
}

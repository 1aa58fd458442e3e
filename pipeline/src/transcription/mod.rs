pub mod engine;
pub mod model;

pub use engine::WhisperEngine;

use anyhow::Result;
use shared::TranscriptChunk;
use std::path::Path;

/// Narrow seam over a speech-to-text engine: audio file in, timed chunks
/// out, in whatever order the model produces them. No internal retry;
/// callers own failure isolation.
#[allow(async_fn_in_trait)]
pub trait Transcriber {
    async fn transcribe(&mut self, audio_path: &Path) -> Result<Vec<TranscriptChunk>>;
}

/// Strip sentence punctuation from engine output, used when punctuated
/// output is disabled.
pub fn strip_punctuation(text: &str) -> String {
    text.chars()
        .filter(|c| !is_sentence_punctuation(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_sentence_punctuation(c: char) -> bool {
    matches!(
        c,
        '、' | '。' | '，' | '．' | '！' | '？' | '：' | '；'
            | ',' | '.' | '!' | '?' | ':' | ';'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_punctuation_japanese() {
        assert_eq!(
            strip_punctuation("おはようございます。今日は、晴れです！"),
            "おはようございます今日は晴れです"
        );
    }

    #[test]
    fn test_strip_punctuation_ascii() {
        assert_eq!(strip_punctuation("Hello, world!"), "Hello world");
    }

    #[test]
    fn test_strip_punctuation_leaves_clean_text_alone() {
        assert_eq!(strip_punctuation("そのまま"), "そのまま");
    }

    #[test]
    fn test_strip_punctuation_trims() {
        assert_eq!(strip_punctuation("end. "), "end");
    }
}

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use regex::Regex;
use shared::{TranscriptChunk, TranscriptLine};

/// Extract a wall-clock base date from a `YYMMDD_HHMM`-prefixed file stem,
/// interpreted as `20YY-MM-DD HH:MM:00`. Stems that do not match (or name
/// an impossible date) yield `None`, which switches rendering to bare
/// elapsed durations instead of failing.
pub fn extract_base_datetime(stem: &str) -> Option<NaiveDateTime> {
    let re = Regex::new(r"^(\d{2})(\d{2})(\d{2})_(\d{2})(\d{2})").unwrap();
    let caps = re.captures(stem)?;

    let year = 2000 + caps[1].parse::<i32>().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

/// Re-align a segment's chunks onto the absolute timeline of the source
/// recording.
///
/// Chunks with a missing start or end are dropped, never defaulted to
/// zero. The remaining chunks are stable-sorted by relative start (ties
/// keep the order the engine produced), then shifted by the segment offset.
pub fn normalize_chunks(chunks: Vec<TranscriptChunk>, offset_seconds: f64) -> Vec<TranscriptLine> {
    let mut timed: Vec<TranscriptChunk> = chunks
        .into_iter()
        .filter(TranscriptChunk::has_timestamps)
        .collect();

    timed.sort_by(|a, b| {
        a.start
            .partial_cmp(&b.start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    timed
        .into_iter()
        .map(|chunk| TranscriptLine {
            start_seconds: chunk.start.unwrap_or(0.0) + offset_seconds,
            end_seconds: chunk.end.unwrap_or(0.0) + offset_seconds,
            text: chunk.text,
            speaker_id: chunk.speaker_id,
        })
        .collect()
}

/// Render seconds as an elapsed duration, `H:MM:SS` with six fractional
/// digits only when the value is not whole.
pub fn format_elapsed(seconds: f64) -> String {
    let total_micros = (seconds * 1_000_000.0).round() as i64;
    let micros = total_micros % 1_000_000;
    let total_secs = total_micros / 1_000_000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if micros == 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}:{:02}.{:06}", hours, minutes, secs, micros)
    }
}

/// Render `base + seconds` as a calendar timestamp with millisecond
/// precision.
pub fn format_calendar(base: NaiveDateTime, seconds: f64) -> String {
    let stamp = base + ChronoDuration::microseconds((seconds * 1_000_000.0).round() as i64);
    stamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// One transcript line: `[<start> --> <end>] [話者 <id>: ]<text>`.
pub fn render_line(line: &TranscriptLine, base: Option<NaiveDateTime>) -> String {
    let (start, end) = match base {
        Some(base) => (
            format_calendar(base, line.start_seconds),
            format_calendar(base, line.end_seconds),
        ),
        None => (
            format_elapsed(line.start_seconds),
            format_elapsed(line.end_seconds),
        ),
    };

    match &line.speaker_id {
        Some(id) => format!("[{} --> {}] 話者 {}: {}", start, end, id, line.text),
        None => format!("[{} --> {}] {}", start, end, line.text),
    }
}

/// Render a full transcript, one line per entry, trailing newline included
/// so merged files concatenate cleanly.
pub fn render_transcript(lines: &[TranscriptLine], base: Option<NaiveDateTime>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&render_line(line, base));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(start: Option<f64>, end: Option<f64>, text: &str) -> TranscriptChunk {
        TranscriptChunk {
            start,
            end,
            text: text.to_string(),
            speaker_id: None,
        }
    }

    #[test]
    fn test_extract_base_datetime() {
        let base = extract_base_datetime("250514_0738_transcription").unwrap();
        assert_eq!(
            base,
            NaiveDate::from_ymd_opt(2025, 5, 14)
                .unwrap()
                .and_hms_opt(7, 38, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_extract_base_datetime_no_match() {
        assert!(extract_base_datetime("transcription").is_none());
        assert!(extract_base_datetime("2505_0738").is_none());
        assert!(extract_base_datetime("abc123_0738").is_none());
    }

    #[test]
    fn test_extract_base_datetime_must_be_prefix() {
        assert!(extract_base_datetime("x250514_0738").is_none());
    }

    #[test]
    fn test_extract_base_datetime_impossible_date() {
        assert!(extract_base_datetime("251345_0738").is_none());
        assert!(extract_base_datetime("250514_2575").is_none());
    }

    #[test]
    fn test_normalize_drops_null_timestamps() {
        let lines = normalize_chunks(
            vec![
                chunk(Some(1.0), Some(2.0), "keep"),
                chunk(None, Some(3.0), "no start"),
                chunk(Some(3.0), None, "no end"),
                chunk(None, None, "nothing"),
            ],
            0.0,
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "keep");
    }

    #[test]
    fn test_normalize_sorts_by_relative_start() {
        let lines = normalize_chunks(
            vec![
                chunk(Some(5.0), Some(6.0), "second"),
                chunk(Some(1.0), Some(2.0), "first"),
                chunk(Some(9.0), Some(10.0), "third"),
            ],
            0.0,
        );
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_normalize_is_stable_for_equal_starts() {
        let lines = normalize_chunks(
            vec![
                chunk(Some(1.0), Some(2.0), "a"),
                chunk(Some(1.0), Some(3.0), "b"),
                chunk(Some(1.0), Some(1.5), "c"),
            ],
            0.0,
        );
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_applies_offset() {
        let lines = normalize_chunks(vec![chunk(Some(10.0), Some(12.0), "x")], 3600.0);
        assert_eq!(lines[0].start_seconds, 3610.0);
        assert_eq!(lines[0].end_seconds, 3612.0);
    }

    #[test]
    fn test_format_elapsed_whole_seconds() {
        assert_eq!(format_elapsed(0.0), "0:00:00");
        assert_eq!(format_elapsed(3610.0), "1:00:10");
        assert_eq!(format_elapsed(45296.0), "12:34:56");
    }

    #[test]
    fn test_format_elapsed_fractional() {
        assert_eq!(format_elapsed(3610.5), "1:00:10.500000");
        assert_eq!(format_elapsed(0.25), "0:00:00.250000");
    }

    #[test]
    fn test_format_calendar() {
        let base = NaiveDate::from_ymd_opt(2025, 5, 14)
            .unwrap()
            .and_hms_opt(7, 38, 0)
            .unwrap();
        assert_eq!(format_calendar(base, 0.0), "2025-05-14 07:38:00.000");
        assert_eq!(format_calendar(base, 3610.5), "2025-05-14 08:38:10.500");
    }

    #[test]
    fn test_render_line_elapsed() {
        let line = TranscriptLine {
            start_seconds: 10.0,
            end_seconds: 12.0,
            text: "おはようございます".to_string(),
            speaker_id: None,
        };
        assert_eq!(
            render_line(&line, None),
            "[0:00:10 --> 0:00:12] おはようございます"
        );
    }

    #[test]
    fn test_render_line_with_speaker() {
        let line = TranscriptLine {
            start_seconds: 10.0,
            end_seconds: 12.0,
            text: "hello".to_string(),
            speaker_id: Some("2".to_string()),
        };
        assert_eq!(render_line(&line, None), "[0:00:10 --> 0:00:12] 話者 2: hello");
    }

    #[test]
    fn test_render_line_calendar() {
        let base = extract_base_datetime("250514_0738").unwrap();
        let line = TranscriptLine {
            start_seconds: 3610.0,
            end_seconds: 3612.0,
            text: "x".to_string(),
            speaker_id: None,
        };
        assert_eq!(
            render_line(&line, Some(base)),
            "[2025-05-14 08:38:10.000 --> 2025-05-14 08:38:12.000] x"
        );
    }

    #[test]
    fn test_render_transcript_one_line_per_entry() {
        let lines = vec![
            TranscriptLine {
                start_seconds: 0.0,
                end_seconds: 1.0,
                text: "a".to_string(),
                speaker_id: None,
            },
            TranscriptLine {
                start_seconds: 1.0,
                end_seconds: 2.0,
                text: "b".to_string(),
                speaker_id: None,
            },
        ];
        let rendered = render_transcript(&lines, None);
        assert_eq!(rendered.lines().count(), 2);
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn test_render_transcript_empty() {
        assert_eq!(render_transcript(&[], None), "");
    }
}

//! Heuristic quality check of an SRT file produced by the OCR run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

static TIME_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{2}:\d{2}:\d{2},\d{3}\s*-->\s*\d{2}:\d{2}:\d{2},\d{3}").expect("valid regex")
});

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2}):(\d{2}):(\d{2}),(\d{3})").expect("valid regex")
});

static INCONSISTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^INCONSISTENT \((\d+) vs (\d+)\)$").expect("valid regex")
});

/// Files smaller than this are flagged regardless of content.
const MIN_SIZE_BYTES: u64 = 100;
/// Allowed gap between sequence numbers and timing lines.
const MAX_COUNT_DRIFT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SrtStatus {
    Unknown,
    Missing,
    Empty,
    TooSmall,
    NoSubs,
    FewSubs,
    Medium,
    Good,
    VeryGood,
    Excellent,
    Inconsistent { subtitles: usize, time_sequences: usize },
    ReadError(String),
    Other(String),
}

impl SrtStatus {
    fn from_count(subtitles: usize) -> Self {
        match subtitles {
            0..=4 => SrtStatus::FewSubs,
            5..=19 => SrtStatus::Medium,
            20..=49 => SrtStatus::Good,
            50..=99 => SrtStatus::VeryGood,
            _ => SrtStatus::Excellent,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            SrtStatus::Medium | SrtStatus::Good | SrtStatus::VeryGood | SrtStatus::Excellent
        )
    }
}

impl fmt::Display for SrtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SrtStatus::Unknown => write!(f, "UNKNOWN"),
            SrtStatus::Missing => write!(f, "MISSING"),
            SrtStatus::Empty => write!(f, "EMPTY"),
            SrtStatus::TooSmall => write!(f, "TOO SMALL"),
            SrtStatus::NoSubs => write!(f, "NO SUBS"),
            SrtStatus::FewSubs => write!(f, "FEW SUBS"),
            SrtStatus::Medium => write!(f, "MEDIUM"),
            SrtStatus::Good => write!(f, "GOOD"),
            SrtStatus::VeryGood => write!(f, "VERY GOOD"),
            SrtStatus::Excellent => write!(f, "EXCELLENT"),
            SrtStatus::Inconsistent { subtitles, time_sequences } => {
                write!(f, "INCONSISTENT ({} vs {})", subtitles, time_sequences)
            }
            SrtStatus::ReadError(kind) => write!(f, "READ ERROR: {}", kind),
            SrtStatus::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl From<SrtStatus> for String {
    fn from(status: SrtStatus) -> Self {
        status.to_string()
    }
}

impl From<String> for SrtStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "UNKNOWN" => return SrtStatus::Unknown,
            "MISSING" => return SrtStatus::Missing,
            "EMPTY" => return SrtStatus::Empty,
            "TOO SMALL" => return SrtStatus::TooSmall,
            "NO SUBS" => return SrtStatus::NoSubs,
            "FEW SUBS" => return SrtStatus::FewSubs,
            "MEDIUM" => return SrtStatus::Medium,
            "GOOD" => return SrtStatus::Good,
            "VERY GOOD" => return SrtStatus::VeryGood,
            "EXCELLENT" => return SrtStatus::Excellent,
            _ => {}
        }
        if let Some(kind) = raw.strip_prefix("READ ERROR: ") {
            return SrtStatus::ReadError(kind.to_string());
        }
        if let Some(caps) = INCONSISTENT.captures(&raw) {
            if let (Ok(subtitles), Ok(time_sequences)) = (caps[1].parse(), caps[2].parse()) {
                return SrtStatus::Inconsistent { subtitles, time_sequences };
            }
        }
        SrtStatus::Other(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrtAnalysis {
    pub size: u64,
    pub lines: usize,
    pub subtitles: usize,
    pub time_sequences: usize,
    pub empty_lines: usize,
    pub avg_subtitle_length: f64,
    /// Last timestamp found in the file, in seconds
    pub duration_seconds: f64,
    pub status: SrtStatus,
    pub has_content: bool,
}

impl Default for SrtAnalysis {
    fn default() -> Self {
        Self {
            size: 0,
            lines: 0,
            subtitles: 0,
            time_sequences: 0,
            empty_lines: 0,
            avg_subtitle_length: 0.0,
            duration_seconds: 0.0,
            status: SrtStatus::Unknown,
            has_content: false,
        }
    }
}

impl SrtAnalysis {
    pub fn is_usable(&self) -> bool {
        self.status.is_usable()
    }
}

fn io_kind_name(e: &std::io::Error) -> String {
    format!("{:?}", e.kind())
}

fn is_sequence_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

/// Analyze an SRT file. Never fails: problems are reported through
/// [`SrtAnalysis::status`].
pub fn analyze_srt_file(path: &Path) -> SrtAnalysis {
    let mut analysis = SrtAnalysis::default();

    if !path.exists() {
        analysis.status = SrtStatus::Missing;
        return analysis;
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            analysis.status = SrtStatus::ReadError(io_kind_name(&e));
            return analysis;
        }
    };

    analysis.size = bytes.len() as u64;
    if analysis.size == 0 {
        analysis.status = SrtStatus::Empty;
        return analysis;
    }

    let content: String = String::from_utf8_lossy(&bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    analyze_content(&content, &mut analysis);
    analysis
}

/// Fill the counters and status of `analysis` from decoded SRT text.
pub fn analyze_content(content: &str, analysis: &mut SrtAnalysis) {
    let lines: Vec<&str> = content.lines().collect();
    analysis.lines = lines.len();
    analysis.empty_lines = lines.iter().filter(|l| l.trim().is_empty()).count();
    analysis.subtitles = lines.iter().filter(|l| is_sequence_line(l)).count();
    analysis.time_sequences = TIME_SEQUENCE.find_iter(content).count();

    let text_lengths: Vec<usize> = lines
        .iter()
        .filter(|l| !is_sequence_line(l))
        .map(|l| TIME_SEQUENCE.replace_all(l, ""))
        .map(|l| l.trim().chars().count())
        .filter(|&len| len > 0)
        .collect();
    if !text_lengths.is_empty() {
        analysis.avg_subtitle_length =
            text_lengths.iter().sum::<usize>() as f64 / text_lengths.len() as f64;
    }

    analysis.has_content = analysis.subtitles > 0 && analysis.time_sequences > 0;

    if let Some(caps) = TIMESTAMP.captures_iter(content).last() {
        let part = |i: usize| caps[i].parse::<f64>().unwrap_or(0.0);
        analysis.duration_seconds = part(1) * 3600.0 + part(2) * 60.0 + part(3) + part(4) / 1000.0;
    }

    analysis.status = if analysis.size < MIN_SIZE_BYTES {
        SrtStatus::TooSmall
    } else if analysis.subtitles == 0 && analysis.time_sequences == 0 {
        SrtStatus::NoSubs
    } else {
        SrtStatus::from_count(analysis.subtitles)
    };

    let drift = analysis.subtitles.abs_diff(analysis.time_sequences);
    if analysis.has_content && drift > MAX_COUNT_DRIFT {
        analysis.status = SrtStatus::Inconsistent {
            subtitles: analysis.subtitles,
            time_sequences: analysis.time_sequences,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srt(cues: usize) -> String {
        (1..=cues)
            .map(|i| {
                format!(
                    "{}\n00:00:{:02},000 --> 00:00:{:02},500\nLine number {}\n\n",
                    i,
                    i % 60,
                    i % 60,
                    i
                )
            })
            .collect()
    }

    fn analyze_str(content: &str) -> SrtAnalysis {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        std::fs::write(&path, content).unwrap();
        analyze_srt_file(&path)
    }

    #[test]
    fn test_missing_file() {
        let analysis = analyze_srt_file(Path::new("this_file_should_not_exist.srt"));
        assert_eq!(analysis.status, SrtStatus::Missing);
        assert_eq!(analysis.size, 0);
    }

    #[test]
    fn test_empty_file() {
        let analysis = analyze_str("");
        assert_eq!(analysis.status, SrtStatus::Empty);
    }

    #[test]
    fn test_tiny_file_is_too_small() {
        let analysis = analyze_str(&srt(1));
        assert_eq!(analysis.status, SrtStatus::TooSmall);
        assert!(analysis.has_content);
    }

    #[test]
    fn test_text_without_cues() {
        let analysis = analyze_str(&"just some words without any cue markers\n".repeat(5));
        assert_eq!(analysis.status, SrtStatus::NoSubs);
        assert!(!analysis.has_content);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(analyze_str(&srt(4)).status, SrtStatus::FewSubs);
        assert_eq!(analyze_str(&srt(5)).status, SrtStatus::Medium);
        assert_eq!(analyze_str(&srt(20)).status, SrtStatus::Good);
        assert_eq!(analyze_str(&srt(50)).status, SrtStatus::VeryGood);
        assert_eq!(analyze_str(&srt(100)).status, SrtStatus::Excellent);
    }

    #[test]
    fn test_counters_and_duration() {
        let content = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n01:02:03,250 --> 01:02:04,750\nWorld!\n";
        let analysis = analyze_str(content);

        assert_eq!(analysis.lines, 7);
        assert_eq!(analysis.empty_lines, 1);
        assert_eq!(analysis.subtitles, 2);
        assert_eq!(analysis.time_sequences, 2);
        assert!((analysis.avg_subtitle_length - 5.5).abs() < 1e-9);
        assert!((analysis.duration_seconds - 3724.75).abs() < 1e-9);
    }

    #[test]
    fn test_inconsistent_counts_override_status() {
        let mut content = srt(30);
        for i in 0..10 {
            content.push_str(&format!("{}\n", 1000 + i));
        }
        let analysis = analyze_str(&content);
        assert_eq!(
            analysis.status,
            SrtStatus::Inconsistent { subtitles: 40, time_sequences: 30 }
        );
        assert_eq!(analysis.status.to_string(), "INCONSISTENT (40 vs 30)");
    }

    #[test]
    fn test_invalid_utf8_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.srt");
        let mut bytes = srt(6).into_bytes();
        bytes.extend_from_slice(&[0xE9, b'\n']);
        std::fs::write(&path, bytes).unwrap();

        let analysis = analyze_srt_file(&path);
        assert_eq!(analysis.status, SrtStatus::Medium);
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            SrtStatus::Excellent,
            SrtStatus::TooSmall,
            SrtStatus::Inconsistent { subtitles: 12, time_sequences: 3 },
            SrtStatus::ReadError("PermissionDenied".to_string()),
        ] {
            assert_eq!(SrtStatus::from(status.to_string()), status);
        }
        assert_eq!(
            SrtStatus::from("something else".to_string()),
            SrtStatus::Other("something else".to_string())
        );
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

use crate::analyzer::{analyze_srt_file, SrtAnalysis};
use crate::error::{OcrError, Result};
use crate::tools::SubtitleRipper;

/// Delay before looking for output; pgsrip may still be flushing files.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Outcome of processing one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
    pub analysis: Option<SrtAnalysis>,
    pub output_srt: Option<PathBuf>,
}

impl RunResult {
    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            analysis: None,
            output_srt: None,
        }
    }

    fn extracted(verb: &str, srt: PathBuf) -> Self {
        let analysis = analyze_srt_file(&srt);
        Self {
            success: true,
            message: format!("SRT {} ({})", verb, analysis.status),
            analysis: Some(analysis),
            output_srt: Some(srt),
        }
    }
}

type Snapshot = HashMap<PathBuf, SystemTime>;

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn is_srt(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("srt"))
        .unwrap_or(false)
}

/// `.srt` files directly inside each folder, keyed by canonical path.
fn snapshot_srt_files(folders: &[&Path]) -> Snapshot {
    let mut seen = Snapshot::new();
    for folder in folders {
        let Ok(entries) = std::fs::read_dir(folder) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_srt(&path) {
                continue;
            }
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                seen.insert(canonical(&path), modified);
            }
        }
    }
    seen
}

/// Files that appeared or were modified between the snapshots, newest first.
fn find_new_srt(before: &Snapshot, after: &Snapshot) -> Vec<PathBuf> {
    let mut fresh: Vec<(&PathBuf, &SystemTime)> = after
        .iter()
        .filter(|(path, modified)| before.get(*path).is_none_or(|old| *modified > old))
        .collect();
    fresh.sort_by(|a, b| b.1.cmp(a.1));
    fresh.into_iter().map(|(p, _)| p.clone()).collect()
}

fn file_stem_lower(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Prefer the newest candidate named after the video, else the newest.
fn choose_candidate<'a>(candidates: &'a [PathBuf], video: &Path) -> Option<&'a PathBuf> {
    let stem = file_stem_lower(video);
    candidates
        .iter()
        .find(|c| file_stem_lower(c).starts_with(&stem))
        .or_else(|| candidates.first())
}

/// Move `from` onto `to`, replacing it; falls back to copy + delete when a
/// rename crosses filesystems.
fn replace_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        std::fs::remove_file(to)?;
    }
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    Ok(())
}

/// Runs the ripper on single videos and collects the produced `.srt`.
pub struct Pipeline {
    ripper: Box<dyn SubtitleRipper>,
    output_dir: PathBuf,
    pgsrip_lang: String,
    settle_delay: Duration,
}

impl Pipeline {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(
        ripper: Box<dyn SubtitleRipper>,
        output_dir: P,
        pgsrip_lang: S,
    ) -> Self {
        Self {
            ripper,
            output_dir: output_dir.into(),
            pgsrip_lang: pgsrip_lang.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// `<output>/<video stem>.<lang>.srt`
    pub fn target_srt(&self, video: &Path) -> PathBuf {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.output_dir.join(format!("{}.{}.srt", stem, self.pgsrip_lang))
    }

    /// Process one video. Never fails; errors become a failed [`RunResult`].
    pub async fn process_video(&self, video: &Path) -> RunResult {
        match self.try_process(video).await {
            Ok(result) => result,
            Err(OcrError::ToolFailed { tool, code }) => {
                RunResult::failure(format!("{} failed (exit code {})", tool, code))
            }
            Err(e) => RunResult::failure(format!("Unexpected error: {}", e)),
        }
    }

    async fn try_process(&self, video: &Path) -> Result<RunResult> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let target = self.target_srt(video);
        let video = canonical(video);
        let work_dir = video
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| OcrError::FileNotFound(video.display().to_string()))?;
        let cwd = std::env::current_dir()?;
        let folders = [work_dir.as_path(), cwd.as_path(), self.output_dir.as_path()];

        let before = snapshot_srt_files(&folders);
        self.ripper.rip(&video, &work_dir).await?;

        tokio::time::sleep(self.settle_delay).await;
        let after = snapshot_srt_files(&folders);
        let candidates = find_new_srt(&before, &after);
        debug!("New or updated subtitles: {:?}", candidates);

        let Some(chosen) = choose_candidate(&candidates, &video) else {
            return Ok(RunResult::failure(
                "pgsrip finished but no new/updated .srt detected",
            ));
        };

        if *chosen == canonical(&target) {
            return Ok(RunResult::extracted("exists", chosen.clone()));
        }

        info!("Moving {} -> {}", chosen.display(), target.display());
        replace_file(chosen, &target)?;
        Ok(RunResult::extracted("extracted", canonical(&target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::pgsrip::MockSubtitleRipper;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello there, general.\n\n\
                          2\n00:00:03,000 --> 00:00:04,000\nYou are a bold one.\n\n\
                          3\n00:00:05,000 --> 00:00:06,000\nKill him!\n";

    struct Fixture {
        _root: tempfile::TempDir,
        video: PathBuf,
        output: PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let videos = root.path().join("videos");
        let output = root.path().join("out");
        std::fs::create_dir_all(&videos).unwrap();
        let video = videos.join("Movie.2024.mkv");
        std::fs::write(&video, b"not really a video").unwrap();
        Fixture { _root: root, video, output }
    }

    fn pipeline(ripper: MockSubtitleRipper, output: &Path) -> Pipeline {
        Pipeline::new(Box::new(ripper), output, "en").with_settle_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_new_srt_is_moved_to_target() {
        let fx = fixture();
        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().times(1).returning(|video, work_dir| {
            let stem = video.file_stem().unwrap().to_string_lossy().to_string();
            std::fs::write(work_dir.join(format!("{}.srt", stem)), SAMPLE)?;
            Ok(())
        });

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;

        let target = fx.output.join("Movie.2024.en.srt");
        assert!(result.success, "{}", result.message);
        assert!(result.message.starts_with("SRT extracted ("));
        assert_eq!(result.output_srt, Some(canonical(&target)));
        assert!(target.exists());
        assert!(!fx.video.with_extension("srt").exists());
        assert_eq!(result.analysis.unwrap().subtitles, 3);
    }

    #[tokio::test]
    async fn test_srt_written_to_target_is_kept() {
        let fx = fixture();
        let output = fx.output.clone();
        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().returning(move |_, _| {
            std::fs::create_dir_all(&output)?;
            std::fs::write(output.join("Movie.2024.en.srt"), SAMPLE)?;
            Ok(())
        });

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;
        assert!(result.success);
        assert!(result.message.starts_with("SRT exists ("));
    }

    #[tokio::test]
    async fn test_prefers_file_named_after_video() {
        let fx = fixture();
        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().returning(|_, work_dir| {
            std::fs::write(work_dir.join("movie.2024.en.srt"), SAMPLE)?;
            std::thread::sleep(Duration::from_millis(20));
            std::fs::write(work_dir.join("unrelated.srt"), "1\n")?;
            Ok(())
        });

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;
        assert!(result.success);
        assert_eq!(result.analysis.unwrap().subtitles, 3);
        assert!(fx.video.parent().unwrap().join("unrelated.srt").exists());
    }

    #[tokio::test]
    async fn test_existing_target_is_replaced() {
        let fx = fixture();
        std::fs::create_dir_all(&fx.output).unwrap();
        std::fs::write(fx.output.join("Movie.2024.en.srt"), "stale").unwrap();

        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().returning(|_, work_dir| {
            std::fs::write(work_dir.join("Movie.2024.srt"), SAMPLE)?;
            Ok(())
        });

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;
        assert!(result.success);
        let content = std::fs::read_to_string(fx.output.join("Movie.2024.en.srt")).unwrap();
        assert_eq!(content, SAMPLE);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let fx = fixture();
        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().returning(|_, _| {
            Err(OcrError::ToolFailed { tool: "pgsrip".to_string(), code: 2 })
        });

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;
        assert!(!result.success);
        assert_eq!(result.message, "pgsrip failed (exit code 2)");
        assert_eq!(result.output_srt, None);
    }

    #[tokio::test]
    async fn test_untouched_srt_is_not_picked_up() {
        let fx = fixture();
        std::fs::write(fx.video.with_extension("srt"), SAMPLE).unwrap();

        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().returning(|_, _| Ok(()));

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;
        assert!(!result.success);
        assert_eq!(result.message, "pgsrip finished but no new/updated .srt detected");
    }

    #[tokio::test]
    async fn test_spawn_error_is_unexpected() {
        let fx = fixture();
        let mut ripper = MockSubtitleRipper::new();
        ripper.expect_rip().returning(|_, _| {
            Err(OcrError::Tool { tool: "pgsrip".to_string(), message: "not found".to_string() })
        });

        let result = pipeline(ripper, &fx.output).process_video(&fx.video).await;
        assert!(result.message.starts_with("Unexpected error: "));
    }

    #[test]
    fn test_target_name_uses_language() {
        let ripper = MockSubtitleRipper::new();
        let pipeline = Pipeline::new(Box::new(ripper), "/out", "ro");
        assert_eq!(
            pipeline.target_srt(Path::new("/in/Show S01E01.mkv")),
            PathBuf::from("/out/Show S01E01.ro.srt")
        );
    }
}

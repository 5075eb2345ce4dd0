use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ensure_dirs, Config};
use crate::error::{OcrError, Result};
use crate::pipeline::Pipeline;
use crate::report::RunReport;
use crate::scanner::VideoFile;
use crate::setup::preflight;
use crate::tools::{PgsripRipper, SubtitleRipper};

/// Processes a batch of videos one after another.
pub struct Workflow {
    config: Config,
    pipeline: Pipeline,
    stop: Arc<AtomicBool>,
    show_progress: bool,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let ripper = PgsripRipper::new(config.tooling.clone(), config.ocr.clone());
        Self::with_ripper(config, Box::new(ripper))
    }

    pub fn with_ripper(config: Config, ripper: Box<dyn SubtitleRipper>) -> Self {
        let pipeline = Pipeline::new(ripper, &config.paths.output_dir, &config.ocr.pgsrip_lang);
        Self {
            config,
            pipeline,
            stop: Arc::new(AtomicBool::new(false)),
            show_progress: true,
        }
    }

    pub fn with_pipeline(mut self, f: impl FnOnce(Pipeline) -> Pipeline) -> Self {
        self.pipeline = f(self.pipeline);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Flag that, once set, stops the batch after the current file.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }

    /// Create the working folders and run the blocking setup checks.
    pub fn prepare(&self) -> Result<()> {
        ensure_dirs(&self.config.paths)?;

        let setup = preflight(&self.config);
        if !setup.is_ok() {
            return Err(OcrError::Setup(setup.problems.join("\n\n")));
        }
        Ok(())
    }

    /// Validate the setup, then run every video. Per-file failures are
    /// recorded in the report; only an invalid setup is an error.
    pub async fn run(&self, videos: &[VideoFile]) -> Result<RunReport> {
        self.prepare()?;

        let mut report = RunReport::new();
        if videos.is_empty() {
            warn!("No video files to process in {}", self.config.paths.input_dir.display());
            return Ok(report);
        }

        let total = videos.len();
        let pb = self.progress_bar(total);
        let mut ok_count = 0;

        for (i, video) in videos.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                info!("Stop requested.");
                break;
            }

            info!("=== [{}/{}] {} ===", i + 1, total, video.name());
            pb.set_message(video.name());

            let result = self.pipeline.process_video(&video.path).await;
            report.record(&video.path, &result);

            info!(
                "Result: {} | {}",
                if result.success { "OK" } else { "FAIL" },
                result.message
            );
            if let Some(srt) = &result.output_srt {
                info!("Output: {}", srt.display());
            }
            if let Some(analysis) = &result.analysis {
                info!("Analysis: {:?}", analysis);
            }

            if result.success {
                ok_count += 1;
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!("Done: {}/{} succeeded.", ok_count, total);
        Ok(report)
    }

    /// Run explicit files, skipping ones that do not exist.
    pub async fn run_files(&self, files: &[PathBuf]) -> Result<RunReport> {
        let videos: Vec<VideoFile> = files
            .iter()
            .filter(|p| {
                let exists = p.is_file();
                if !exists {
                    warn!("Skipping missing file: {}", p.display());
                }
                exists
            })
            .map(|p| VideoFile {
                path: p.clone(),
                size_bytes: std::fs::metadata(p).ok().map(|m| m.len()),
            })
            .collect();
        self.run(&videos).await
    }
}

//! subtitle-ocr - batch OCR of image-based subtitles to SRT
//!
//! Scans a folder of videos, runs pgsrip (Tesseract + MKVToolNix) on each
//! one and collects the resulting `.srt` files with a quality analysis.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subtitle_ocr::analyzer::analyze_srt_file;
use subtitle_ocr::cli::{Args, Commands, ModelsAction, SettingsAction};
use subtitle_ocr::config::Config;
use subtitle_ocr::error::OcrError;
use subtitle_ocr::models::{self, ModelDownloader};
use subtitle_ocr::report::{default_report_name, RunReport};
use subtitle_ocr::scanner::scan_videos;
use subtitle_ocr::settings::Settings;
use subtitle_ocr::setup::SetupChecker;
use subtitle_ocr::workflow::Workflow;

const LOG_FILE: &str = "subtitle-ocr.log";
const SETUP_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let store = args.settings_store();
    let config = args.resolve_config(&store)?;

    let _guard = setup_logging(args.verbose, &config.paths.log_dir)?;
    info!("Starting subtitle-ocr");

    let persist = |config: &Config| {
        if args.no_save {
            return;
        }
        match store.save(&Settings::from_config(config)) {
            Ok(path) => info!("Settings saved: {}", path.display()),
            Err(e) => warn!("Could not save settings: {}", e),
        }
    };

    match args.command {
        Commands::Scan { extensions } => {
            let videos = scan_videos(&config.paths.input_dir, &extensions);
            if videos.is_empty() {
                println!("No video files found in {}", config.paths.input_dir.display());
            } else {
                println!(
                    "Found {} video file(s) in {}:",
                    videos.len(),
                    config.paths.input_dir.display()
                );
                for video in &videos {
                    println!("  {}", video.label());
                }
            }
            persist(&config);
        }
        Commands::Check => {
            let report = SetupChecker::new(&config).check().await;
            print!("{}", report);
            persist(&config);
            if !report.is_ok() {
                return Ok(ExitCode::from(SETUP_FAILED));
            }
        }
        Commands::Run { files, extensions, report } => {
            let workflow = Workflow::new(config.clone());
            if let Err(e) = workflow.prepare() {
                return setup_failed(e);
            }
            persist(&config);

            let stop = workflow.stop_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("Stop requested; finishing the current file (Ctrl-C again to abort)...");
                stop.store(true, Ordering::SeqCst);
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Aborted.");
                    std::process::exit(130);
                }
            });

            let outcome = if files.is_empty() {
                let videos = scan_videos(&config.paths.input_dir, &extensions);
                workflow.run(&videos).await
            } else {
                workflow.run_files(&files).await
            };

            let run_report = match outcome {
                Ok(run_report) => run_report,
                Err(e) => return setup_failed(e),
            };

            println!("{}", run_report.summary_text());
            if !run_report.is_empty() {
                let path = report.unwrap_or_else(|| {
                    config.paths.log_dir.join(default_report_name(&Local::now()))
                });
                run_report.export(&path)?;
                println!("Report saved: {}", path.display());
            }
            if run_report.failed() > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Analyze { srt, json } => {
            if !srt.is_file() {
                return Err(OcrError::FileNotFound(srt.display().to_string()).into());
            }
            let analysis = analyze_srt_file(&srt);
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("File: {}", srt.display());
                println!("Status: {}", analysis.status);
                println!("Size: {} bytes", analysis.size);
                println!("Lines: {}", analysis.lines);
                println!("Subtitles: {}", analysis.subtitles);
                println!("Time sequences: {}", analysis.time_sequences);
                println!("Empty lines: {}", analysis.empty_lines);
                println!("Average subtitle length: {:.1}", analysis.avg_subtitle_length);
                println!("Duration: {:.1}s", analysis.duration_seconds);
            }
        }
        Commands::Summary { report } => {
            println!("{}", RunReport::load(&report)?);
        }
        Commands::Export { report, output } => {
            let format = RunReport::load(&report)?.export(&output)?;
            println!("Exported {:?} report: {}", format, output.display());
        }
        Commands::Models { action } => match action {
            ModelsAction::List => {
                let Some(dir) = config.tooling.tessdata_prefix.as_deref() else {
                    println!("TESSDATA_PREFIX is not set.");
                    return Ok(ExitCode::SUCCESS);
                };
                let langs = models::list_installed(dir);
                if langs.is_empty() {
                    println!("No .traineddata files in {}", dir.display());
                } else {
                    println!("Installed in {}:", dir.display());
                    for lang in langs {
                        println!("  {}", lang);
                    }
                }
            }
            ModelsAction::Download { dest, owner, repo, asset } => {
                let dest = dest.unwrap_or_else(|| {
                    models::download_destination(config.tooling.tessdata_prefix.as_deref())
                });
                let extracted = ModelDownloader::new(owner, repo, asset)?.download(&dest).await?;
                println!("Extracted {} file(s) to {}", extracted.len(), dest.display());
                if config.tooling.tessdata_prefix.as_deref() != Some(dest.as_path()) {
                    println!("Set TESSDATA_PREFIX={} to use them.", dest.display());
                }
            }
        },
        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                println!("{}", serde_json::to_string_pretty(&Settings::from_config(&config))?);
            }
            SettingsAction::Path => {
                println!("{}", store.path().display());
            }
            SettingsAction::Save => {
                let path = store.save(&Settings::from_config(&config))?;
                println!("Settings saved: {}", path.display());
            }
            SettingsAction::Reset => {
                if store.reset()? {
                    println!("Settings reset: {}", store.path().display());
                } else {
                    println!("No settings file at {}", store.path().display());
                }
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

/// Setup problems exit with status 2; any other error propagates.
fn setup_failed(error: OcrError) -> Result<ExitCode> {
    match error {
        OcrError::Setup(problems) => {
            eprintln!("Setup problems:\n\n{}", problems);
            Ok(ExitCode::from(SETUP_FAILED))
        }
        other => Err(other.into()),
    }
}

fn setup_logging(verbose: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, LOG_FILE);
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join(LOG_FILE).display()
    );
    Ok(guard)
}

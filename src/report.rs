//! Run summary and its JSON / CSV export.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::analyzer::SrtAnalysis;
use crate::error::{OcrError, Result};
use crate::pipeline::RunResult;

/// Failures listed by name in the summary before truncating.
const MAX_LISTED_FAILURES: usize = 10;

pub const CSV_COLUMNS: [&str; 12] = [
    "video",
    "success",
    "message",
    "output_srt",
    "status",
    "size",
    "lines",
    "subtitles",
    "time_sequences",
    "empty_lines",
    "avg_subtitle_length",
    "duration_seconds",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// `.csv` (any case) selects CSV, everything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub video: PathBuf,
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub analysis: Option<SrtAnalysis>,
    #[serde(default)]
    pub output_srt: Option<PathBuf>,
}

impl RunRecord {
    pub fn new(video: &Path, result: &RunResult) -> Self {
        Self {
            video: video.to_path_buf(),
            success: result.success,
            message: result.message.clone(),
            analysis: result.analysis.clone(),
            output_srt: result.output_srt.clone(),
        }
    }

    fn video_name(&self) -> String {
        self.video
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.video.display().to_string())
    }

    fn csv_row(&self) -> Vec<String> {
        let analysis = |f: fn(&SrtAnalysis) -> String| {
            self.analysis.as_ref().map(f).unwrap_or_default()
        };
        vec![
            self.video.display().to_string(),
            self.success.to_string(),
            self.message.clone(),
            self.output_srt
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            analysis(|a| a.status.to_string()),
            analysis(|a| a.size.to_string()),
            analysis(|a| a.lines.to_string()),
            analysis(|a| a.subtitles.to_string()),
            analysis(|a| a.time_sequences.to_string()),
            analysis(|a| a.empty_lines.to_string()),
            analysis(|a| a.avg_subtitle_length.to_string()),
            analysis(|a| a.duration_seconds.to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Local time, ISO-8601 to the second; rewritten on JSON export
    pub generated_at: String,
    pub run_id: Uuid,
    pub results: Vec<RunRecord>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            generated_at: iso_seconds(&Local::now()),
            run_id: Uuid::new_v4(),
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, video: &Path, result: &RunResult) {
        self.results.push(RunRecord::new(video, result));
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunRecord> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Multi-line summary: counts, then up to ten failures.
    pub fn summary_text(&self) -> String {
        if self.is_empty() {
            return "No run results yet.".to_string();
        }

        let mut lines = vec![
            format!("Total: {}", self.total()),
            format!("Success: {}", self.succeeded()),
            format!("Failed: {}", self.failed()),
            String::new(),
        ];

        let failures: Vec<&RunRecord> = self.failures().collect();
        if failures.is_empty() {
            lines.push("No failures.".to_string());
        } else {
            lines.push("Failures:".to_string());
            for record in failures.iter().take(MAX_LISTED_FAILURES) {
                lines.push(format!("- {}: {}", record.video_name(), record.message));
            }
            if failures.len() > MAX_LISTED_FAILURES {
                lines.push(format!("... and {} more", failures.len() - MAX_LISTED_FAILURES));
            }
        }

        lines.join("\n")
    }

    /// Write the report in the format implied by the file extension.
    pub fn export(&self, path: &Path) -> Result<ExportFormat> {
        if self.is_empty() {
            return Err(OcrError::Report("No run results to export yet.".to_string()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let format = ExportFormat::from_path(path);
        match format {
            ExportFormat::Json => self.export_json(path)?,
            ExportFormat::Csv => self.export_csv(path)?,
        }
        Ok(format)
    }

    /// Write pretty JSON, stamping `generated_at` with the export time.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let stamped = RunReport {
            generated_at: iso_seconds(&Local::now()),
            ..self.clone()
        };
        let content = serde_json::to_string_pretty(&stamped)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(CSV_COLUMNS)?;
        for record in &self.results {
            writer.write_record(record.csv_row())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a report previously exported as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(OcrError::FileNotFound(path.display().to_string()));
        }
        if ExportFormat::from_path(path) == ExportFormat::Csv {
            return Err(OcrError::Report(
                "Only JSON reports can be loaded; CSV is export-only".to_string(),
            ));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_text())
    }
}

fn iso_seconds(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// `subtitle_ocr_report_<YYYYMMDD_HHMMSS>.json`
pub fn default_report_name(time: &DateTime<Local>) -> String {
    format!("subtitle_ocr_report_{}.json", time.format("%Y%m%d_%H%M%S"))
}

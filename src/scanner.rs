use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Container extensions scanned by default.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "m4v", "ts"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoFile {
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
}

impl VideoFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn size_mb(&self) -> Option<f64> {
        self.size_bytes.map(|b| b as f64 / (1024.0 * 1024.0))
    }

    /// `name (12.3 MB)`, or just the name when the size is unknown.
    pub fn label(&self) -> String {
        match self.size_mb() {
            Some(mb) => format!("{} ({:.1} MB)", self.name(), mb),
            None => self.name(),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// List video files directly inside `folder` (no recursion) whose extension
/// matches, case-insensitively. An empty `extensions` slice means
/// [`VIDEO_EXTENSIONS`]. A missing folder yields an empty list.
pub fn scan_videos(folder: &Path, extensions: &[String]) -> Vec<VideoFile> {
    let wanted: Vec<String> = if extensions.is_empty() {
        VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        extensions.iter().map(|e| normalize_extension(e)).collect()
    };

    if !folder.is_dir() {
        debug!("Scan folder does not exist: {}", folder.display());
        return Vec::new();
    }

    let mut videos: Vec<VideoFile> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| wanted.contains(&ext.to_lowercase()))
                .unwrap_or(false)
        })
        .map(|entry| VideoFile {
            size_bytes: entry.metadata().ok().map(|m| m.len()),
            path: entry.into_path(),
        })
        .collect();

    videos.sort_by(|a, b| a.path.cmp(&b.path));
    videos
}

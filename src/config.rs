use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OcrError, Result};

pub const DEFAULT_TAGS: &str = "ocr tidy no-sdh no-style";
pub const DEFAULT_MAX_WORKERS: u32 = 4;

#[cfg(windows)]
const DEFAULT_TESSERACT_EXE: &str = r"C:\Program Files\Tesseract-OCR\tesseract.exe";
#[cfg(not(windows))]
const DEFAULT_TESSERACT_EXE: &str = "tesseract";

const DEFAULT_MKVTOOLNIX_DIR: &str = r"C:\Program Files\MKVToolNix";

fn default_pgsrip_exe() -> String {
    "pgsrip".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub paths: Paths,
    pub tooling: Tooling,
    pub ocr: OcrSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paths {
    /// Folder scanned for video files
    pub input_dir: PathBuf,
    /// Folder receiving the renamed `.srt` files
    pub output_dir: PathBuf,
    /// Folder for the rolling log file and run reports
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tooling {
    /// Path to the tesseract executable (a bare name is looked up on PATH)
    pub tesseract_exe: PathBuf,
    /// Folder holding mkvmerge / mkvextract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mkvtoolnix_dir: Option<PathBuf>,
    /// Folder holding `<lang>.traineddata` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tessdata_prefix: Option<PathBuf>,
    /// pgsrip command line; may carry leading arguments such as `python -m pgsrip`
    #[serde(default = "default_pgsrip_exe")]
    pub pgsrip_exe: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// IETF language passed to pgsrip, e.g. `en`, `ro`
    pub pgsrip_lang: String,
    /// Tesseract language code, e.g. `eng`, `ron`
    pub tess_lang: String,
    /// pgsrip post-processing tags
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<u32>,
    pub force: bool,
    pub rip_all: bool,
    pub debug_verbose: bool,
    pub keep_temp: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            pgsrip_lang: "en".to_string(),
            tess_lang: "eng".to_string(),
            tags: parse_tags(DEFAULT_TAGS),
            max_workers: Some(DEFAULT_MAX_WORKERS),
            force: true,
            rip_all: false,
            debug_verbose: false,
            keep_temp: false,
        }
    }
}

/// Split a whitespace separated tag list, dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Values resolved from the environment (and `.env`) before any settings
/// file or command-line override is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub pgsrip_lang: String,
    pub tess_lang: String,
    pub tesseract_exe: PathBuf,
    pub tessdata_prefix: Option<PathBuf>,
    pub mkvtoolnix_dir: Option<PathBuf>,
    pub pgsrip_exe: String,
}

impl Defaults {
    /// Load `.env` (or the given env file) without overriding variables that
    /// are already set, then read the configuration keys.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    OcrError::Config(format!("Failed to load env file {}: {}", path.display(), e))
                })?;
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    debug!("Loaded environment from {}", path.display());
                }
            }
        }

        let root = project_root();
        Ok(Self::from_lookup(&root, |key| std::env::var(key).ok()))
    }

    /// Resolve defaults from an arbitrary key lookup, relative to `root`.
    pub fn from_lookup<F>(root: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let dir = |key: &str, fallback: &str| match non_empty(key) {
            Some(raw) => absolutize(root, &expand_home(&raw)),
            None => root.join(fallback),
        };

        let tessdata_prefix = match non_empty("TESSDATA_PREFIX") {
            Some(raw) => Some(absolutize(root, &expand_home(&raw))),
            None => Some(root.join("tessdata_best")).filter(|p| p.exists()),
        };

        let mkvtoolnix_dir = match non_empty("MKVTOOLNIX_DIR") {
            Some(raw) => Some(absolutize(root, &expand_home(&raw))),
            None => Some(PathBuf::from(DEFAULT_MKVTOOLNIX_DIR)).filter(|p| p.exists()),
        };

        Self {
            input_dir: dir("INPUT_DIR", "input"),
            output_dir: dir("OUTPUT_DIR", "output"),
            log_dir: dir("LOG_DIR", "logs"),
            pgsrip_lang: non_empty("PGSRIP_LANG").unwrap_or_else(|| "en".to_string()),
            tess_lang: non_empty("TESS_LANG").unwrap_or_else(|| "eng".to_string()),
            tesseract_exe: non_empty("TESSERACT_EXE")
                .map(|raw| expand_home(&raw))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TESSERACT_EXE)),
            tessdata_prefix,
            mkvtoolnix_dir,
            pgsrip_exe: non_empty("PGSRIP_EXE").unwrap_or_else(default_pgsrip_exe),
        }
    }
}

impl From<Defaults> for Config {
    fn from(defaults: Defaults) -> Self {
        Self {
            paths: Paths {
                input_dir: defaults.input_dir,
                output_dir: defaults.output_dir,
                log_dir: defaults.log_dir,
            },
            tooling: Tooling {
                tesseract_exe: defaults.tesseract_exe,
                mkvtoolnix_dir: defaults.mkvtoolnix_dir,
                tessdata_prefix: defaults.tessdata_prefix,
                pgsrip_exe: defaults.pgsrip_exe,
            },
            ocr: OcrSettings {
                pgsrip_lang: defaults.pgsrip_lang,
                tess_lang: defaults.tess_lang,
                ..OcrSettings::default()
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OcrError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| OcrError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OcrError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| OcrError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Create the input, output and log directories if missing.
pub fn ensure_dirs(paths: &Paths) -> Result<()> {
    for dir in [&paths.input_dir, &paths.output_dir, &paths.log_dir] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Directory relative paths are resolved against. Falls back to `.` when the
/// working directory is unavailable.
pub fn project_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

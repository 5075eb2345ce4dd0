//! Persisted user settings.
//!
//! Stored as JSON under the platform configuration directory:
//!
//!   Windows: %APPDATA%\subtitle-ocr-pro\settings.json
//!   macOS:   ~/Library/Application Support/subtitle-ocr-pro/settings.json
//!   Linux:   ~/.config/subtitle-ocr-pro/settings.json
//!
//! Every field is stored as the user typed it; empty strings mean "use the
//! environment default".

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{parse_tags, Config, DEFAULT_MAX_WORKERS, DEFAULT_TAGS};
use crate::error::Result;

pub const APP_NAME: &str = "subtitle-ocr-pro";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_dir: String,
    pub output_dir: String,
    pub log_dir: String,
    pub pgsrip_lang: String,
    pub tess_lang: String,
    pub tess_exe: String,
    pub tessdata_prefix: String,
    pub mkvtoolnix_dir: String,
    pub tags: String,
    /// `0` leaves the worker count to pgsrip
    pub max_workers: u32,
    pub force: bool,
    pub rip_all: bool,
    pub debug_verbose: bool,
    pub keep_temp: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: String::new(),
            output_dir: String::new(),
            log_dir: String::new(),
            pgsrip_lang: "en".to_string(),
            tess_lang: "eng".to_string(),
            tess_exe: String::new(),
            tessdata_prefix: String::new(),
            mkvtoolnix_dir: String::new(),
            tags: DEFAULT_TAGS.to_string(),
            max_workers: DEFAULT_MAX_WORKERS,
            force: true,
            rip_all: false,
            debug_verbose: false,
            keep_temp: false,
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl Settings {
    /// Snapshot the current configuration in persisted form.
    pub fn from_config(config: &Config) -> Self {
        Self {
            input_dir: path_string(&config.paths.input_dir),
            output_dir: path_string(&config.paths.output_dir),
            log_dir: path_string(&config.paths.log_dir),
            pgsrip_lang: config.ocr.pgsrip_lang.clone(),
            tess_lang: config.ocr.tess_lang.clone(),
            tess_exe: path_string(&config.tooling.tesseract_exe),
            tessdata_prefix: config
                .tooling
                .tessdata_prefix
                .as_deref()
                .map(path_string)
                .unwrap_or_default(),
            mkvtoolnix_dir: config
                .tooling
                .mkvtoolnix_dir
                .as_deref()
                .map(path_string)
                .unwrap_or_default(),
            tags: config.ocr.tags.join(" "),
            max_workers: config.ocr.max_workers.unwrap_or(0),
            force: config.ocr.force,
            rip_all: config.ocr.rip_all,
            debug_verbose: config.ocr.debug_verbose,
            keep_temp: config.ocr.keep_temp,
        }
    }

    /// Overlay persisted values on `config`. Non-empty strings win over the
    /// environment defaults; flags always come from the settings.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(v) = non_empty(&self.input_dir) {
            config.paths.input_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&self.output_dir) {
            config.paths.output_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&self.log_dir) {
            config.paths.log_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&self.pgsrip_lang) {
            config.ocr.pgsrip_lang = v.to_string();
        }
        if let Some(v) = non_empty(&self.tess_lang) {
            config.ocr.tess_lang = v.to_string();
        }
        if let Some(v) = non_empty(&self.tess_exe) {
            config.tooling.tesseract_exe = PathBuf::from(v);
        }
        if let Some(v) = non_empty(&self.tessdata_prefix) {
            config.tooling.tessdata_prefix = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&self.mkvtoolnix_dir) {
            config.tooling.mkvtoolnix_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty(&self.tags) {
            config.ocr.tags = parse_tags(v);
        }
        config.ocr.max_workers = (self.max_workers > 0).then_some(self.max_workers);
        config.ocr.force = self.force;
        config.ocr.rip_all = self.rip_all;
        config.ocr.debug_verbose = self.debug_verbose;
        config.ocr.keep_temp = self.keep_temp;
    }
}

/// Reads and writes [`Settings`] at a fixed location.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the platform default location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME);
        Self::at(config_dir.join(SETTINGS_FILE))
    }

    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load settings. A missing or malformed file yields the defaults;
    /// unknown keys are ignored.
    pub fn load(&self) -> Settings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No settings at {}, using defaults", self.path.display());
                return Settings::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings file {}: {}", self.path.display(), e);
                Settings::default()
            }
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<&Path> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content)?;
        Ok(&self.path)
    }

    /// Delete the settings file. Returns whether one existed.
    pub fn reset(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("nested").join(SETTINGS_FILE));
        (dir, store)
    }

    fn base_config(root: &Path) -> Config {
        Config::from(Defaults::from_lookup(root, |_| None))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (_dir, store) = store();
        assert!(!store.exists());
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, store) = store();
        let settings = Settings {
            input_dir: "D:\\Filme\\Séries".to_string(),
            rip_all: true,
            max_workers: 2,
            ..Settings::default()
        };

        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("Séries"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(
            store.path(),
            r#"{"tess_lang": "ron", "window_geometry": "1100x860"}"#,
        )
        .unwrap();

        let settings = store.load();
        assert_eq!(settings.tess_lang, "ron");
        assert_eq!(settings.pgsrip_lang, "en");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_reset_removes_file() {
        let (_dir, store) = store();
        assert!(!store.reset().unwrap());
        store.save(&Settings::default()).unwrap();
        assert!(store.reset().unwrap());
        assert!(!store.exists());
    }

    #[test]
    fn test_empty_strings_keep_environment_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        let before = config.clone();

        Settings::default().apply_to(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn test_persisted_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());

        let settings = Settings {
            output_dir: "/srv/subs".to_string(),
            tess_lang: "ita".to_string(),
            tags: "ocr tidy".to_string(),
            max_workers: 0,
            force: false,
            ..Settings::default()
        };
        settings.apply_to(&mut config);

        assert_eq!(config.paths.output_dir, PathBuf::from("/srv/subs"));
        assert_eq!(config.ocr.tess_lang, "ita");
        assert_eq!(config.ocr.tags, vec!["ocr", "tidy"]);
        assert_eq!(config.ocr.max_workers, None);
        assert!(!config.ocr.force);
    }

    #[test]
    fn test_from_config_then_apply_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = base_config(dir.path());
        config.tooling.mkvtoolnix_dir = Some(dir.path().join("mkv"));

        let settings = Settings::from_config(&config);
        let mut restored = base_config(dir.path());
        settings.apply_to(&mut restored);

        assert_eq!(restored, config);
    }
}

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{expand_home, parse_tags, Config, Defaults};
use crate::error::Result;
use crate::settings::SettingsStore;

#[derive(Parser)]
#[command(name = "subtitle-ocr", author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (TOML); replaces environment defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Load variables from this file instead of `.env`
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    pub settings_file: Option<PathBuf>,

    /// Do not apply the persisted settings
    #[arg(long, global = true)]
    pub ignore_settings: bool,

    /// Do not persist settings after the command
    #[arg(long, global = true)]
    pub no_save: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// Settings store named by `--settings-file`, else the per-user one.
    pub fn settings_store(&self) -> SettingsStore {
        match &self.settings_file {
            Some(path) => SettingsStore::at(path),
            None => SettingsStore::new(),
        }
    }

    /// Environment (or the `--config` TOML file), then persisted settings,
    /// then command-line overrides.
    pub fn resolve_config(&self, store: &SettingsStore) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::from(Defaults::load(self.env_file.as_deref())?),
        };

        if !self.ignore_settings && store.exists() {
            store.load().apply_to(&mut config);
        }
        self.overrides.apply(&mut config);
        Ok(config)
    }
}

/// Command-line values that win over settings and environment.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct Overrides {
    /// Folder scanned for videos
    #[arg(short, long, global = true)]
    pub input_dir: Option<PathBuf>,

    /// Folder receiving the .srt files
    #[arg(short, long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Folder for logs and reports
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long, global = true)]
    pub tesseract_exe: Option<PathBuf>,

    /// Folder holding <lang>.traineddata files
    #[arg(long, global = true)]
    pub tessdata_prefix: Option<PathBuf>,

    /// Folder holding mkvmerge / mkvextract
    #[arg(long, global = true)]
    pub mkvtoolnix_dir: Option<PathBuf>,

    /// pgsrip command line
    #[arg(long, global = true)]
    pub pgsrip_exe: Option<String>,

    /// Subtitle language for pgsrip (e.g. en, ro)
    #[arg(long, global = true)]
    pub lang: Option<String>,

    /// Tesseract language (e.g. eng, ron)
    #[arg(long, global = true)]
    pub tess_lang: Option<String>,

    /// pgsrip tags, space separated
    #[arg(long, global = true)]
    pub tags: Option<String>,

    /// pgsrip worker count; 0 lets pgsrip decide
    #[arg(long, global = true)]
    pub max_workers: Option<u32>,

    /// Keep existing subtitles instead of forcing a re-rip
    #[arg(long, global = true)]
    pub no_force: bool,

    /// Rip every subtitle track
    #[arg(long, global = true)]
    pub all: bool,

    /// Run pgsrip with --verbose --debug
    #[arg(long, global = true)]
    pub debug_pgsrip: bool,

    /// Keep pgsrip temporary files
    #[arg(long, global = true)]
    pub keep_temp: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        let path = |p: &PathBuf| expand_home(&p.to_string_lossy());

        if let Some(dir) = &self.input_dir {
            config.paths.input_dir = path(dir);
        }
        if let Some(dir) = &self.output_dir {
            config.paths.output_dir = path(dir);
        }
        if let Some(dir) = &self.log_dir {
            config.paths.log_dir = path(dir);
        }
        if let Some(exe) = &self.tesseract_exe {
            config.tooling.tesseract_exe = path(exe);
        }
        if let Some(dir) = &self.tessdata_prefix {
            config.tooling.tessdata_prefix = Some(path(dir));
        }
        if let Some(dir) = &self.mkvtoolnix_dir {
            config.tooling.mkvtoolnix_dir = Some(path(dir));
        }
        if let Some(exe) = &self.pgsrip_exe {
            config.tooling.pgsrip_exe = exe.clone();
        }
        if let Some(lang) = &self.lang {
            config.ocr.pgsrip_lang = lang.clone();
        }
        if let Some(lang) = &self.tess_lang {
            config.ocr.tess_lang = lang.clone();
        }
        if let Some(tags) = &self.tags {
            config.ocr.tags = parse_tags(tags);
        }
        if let Some(workers) = self.max_workers {
            config.ocr.max_workers = (workers > 0).then_some(workers);
        }
        if self.no_force {
            config.ocr.force = false;
        }
        if self.all {
            config.ocr.rip_all = true;
        }
        if self.debug_pgsrip {
            config.ocr.debug_verbose = true;
        }
        if self.keep_temp {
            config.ocr.keep_temp = true;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the video files found in the input folder
    Scan {
        /// Extensions to match (default: mkv mp4 m4v ts)
        #[arg(short, long = "ext", value_delimiter = ',')]
        extensions: Vec<String>,
    },

    /// Check that Tesseract, MKVToolNix, trained data and pgsrip are usable
    Check,

    /// OCR every video in the input folder (or the given files)
    Run {
        /// Video files to process instead of scanning the input folder
        files: Vec<PathBuf>,

        /// Extensions to match when scanning
        #[arg(short, long = "ext", value_delimiter = ',')]
        extensions: Vec<String>,

        /// Where to write the run report (.json or .csv)
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Analyze an existing .srt file
    Analyze {
        /// Subtitle file
        srt: PathBuf,

        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the summary of a saved run report
    Summary {
        /// Report file (.json)
        report: PathBuf,
    },

    /// Convert a saved run report to JSON or CSV
    Export {
        /// Report file (.json)
        report: PathBuf,

        /// Output file; the extension selects the format
        output: PathBuf,
    },

    /// Manage Tesseract trained data
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Manage persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
pub enum ModelsAction {
    /// List installed trained data
    List,

    /// Download trained data from the latest GitHub release
    Download {
        /// Destination folder (default: TESSDATA_PREFIX)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        #[arg(long, default_value = crate::models::DEFAULT_OWNER)]
        owner: String,

        #[arg(long, default_value = crate::models::DEFAULT_REPO)]
        repo: String,

        #[arg(long, default_value = crate::models::DEFAULT_ASSET)]
        asset: String,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the effective settings
    Show,

    /// Print the settings file location
    Path,

    /// Save the effective settings
    Save,

    /// Delete the settings file
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use std::path::Path;

    fn config() -> Config {
        Config::from(Defaults::from_lookup(Path::new("/project"), |_| None))
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let args = Args::try_parse_from([
            "subtitle-ocr",
            "run",
            "--lang",
            "ro",
            "--tess-lang",
            "ron",
            "--max-workers",
            "0",
            "--no-force",
            "--tags",
            "ocr tidy",
        ])
        .unwrap();

        let mut config = config();
        args.overrides.apply(&mut config);

        assert_eq!(config.ocr.pgsrip_lang, "ro");
        assert_eq!(config.ocr.tess_lang, "ron");
        assert_eq!(config.ocr.max_workers, None);
        assert!(!config.ocr.force);
        assert_eq!(config.ocr.tags, vec!["ocr", "tidy"]);
        assert!(matches!(args.command, Commands::Run { .. }));
    }

    struct Layers {
        dir: tempfile::TempDir,
        store: SettingsStore,
    }

    /// TOML config, then a settings file overriding part of it.
    fn layers() -> Layers {
        let dir = tempfile::tempdir().unwrap();
        let mut base = config();
        base.paths.input_dir = PathBuf::from("/toml/in");
        base.paths.output_dir = PathBuf::from("/toml/out");
        base.ocr.pgsrip_lang = "de".to_string();
        base.save_to_file(dir.path().join("config.toml")).unwrap();

        let store = SettingsStore::at(dir.path().join("settings.json"));
        let settings = crate::settings::Settings {
            input_dir: "/settings/in".to_string(),
            pgsrip_lang: "fr".to_string(),
            ..Default::default()
        };
        store.save(&settings).unwrap();
        Layers { dir, store }
    }

    fn parse(layers: &Layers, extra: &[&str]) -> Args {
        let config = layers.dir.path().join("config.toml");
        let mut argv = vec!["subtitle-ocr", "--config", config.to_str().unwrap()];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_resolution_order_file_then_settings_then_flags() {
        let layers = layers();
        let args = parse(&layers, &["run", "--lang", "ro"]);

        let config = args.resolve_config(&layers.store).unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("/toml/out"));
        assert_eq!(config.paths.input_dir, PathBuf::from("/settings/in"));
        assert_eq!(config.ocr.pgsrip_lang, "ro");
    }

    #[test]
    fn test_ignore_settings_skips_the_middle_layer() {
        let layers = layers();
        let args = parse(&layers, &["--ignore-settings", "scan"]);

        let config = args.resolve_config(&layers.store).unwrap();
        assert_eq!(config.paths.input_dir, PathBuf::from("/toml/in"));
        assert_eq!(config.ocr.pgsrip_lang, "de");
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = config();
        Overrides::default().apply(&mut config);
        assert_eq!(config, self::config());
    }

    #[test]
    fn test_run_accepts_files_and_extensions() {
        let args =
            Args::try_parse_from(["subtitle-ocr", "run", "a.mkv", "b.mp4", "--ext", "mkv,mp4"])
                .unwrap();
        let Commands::Run { files, extensions, report } = args.command else {
            panic!("expected run");
        };
        assert_eq!(files, vec![PathBuf::from("a.mkv"), PathBuf::from("b.mp4")]);
        assert_eq!(extensions, vec!["mkv", "mp4"]);
        assert!(report.is_none());
    }

    #[test]
    fn test_models_download_defaults() {
        let args = Args::try_parse_from(["subtitle-ocr", "models", "download"]).unwrap();
        let Commands::Models { action: ModelsAction::Download { owner, asset, dest, .. } } =
            args.command
        else {
            panic!("expected models download");
        };
        assert_eq!(owner, crate::models::DEFAULT_OWNER);
        assert_eq!(asset, crate::models::DEFAULT_ASSET);
        assert!(dest.is_none());
    }
}

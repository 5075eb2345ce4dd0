use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

use super::ToolCommand;
use crate::config::{OcrSettings, Tooling};
use crate::error::{OcrError, Result};

/// pgsrip release the command-line flags below were written against.
pub const PINNED_VERSION: &str = "0.1.11";

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("valid regex"));

/// Extracts subtitle tracks from a video and OCRs them into `.srt` files
/// somewhere under `work_dir`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubtitleRipper: Send + Sync {
    async fn rip(&self, video: &Path, work_dir: &Path) -> Result<()>;
}

/// Build the pgsrip invocation for one video.
pub fn build_command(tooling: &Tooling, settings: &OcrSettings, video: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::from_command_line(&tooling.pgsrip_exe, "pgsrip extraction")
        .arg("--language")
        .arg(&settings.pgsrip_lang);

    if settings.debug_verbose {
        cmd = cmd.args(["--verbose", "--debug"]);
    }
    if settings.keep_temp {
        cmd = cmd.arg("--keep-temp-files");
    }
    for tag in &settings.tags {
        cmd = cmd.arg("--tag").arg(tag);
    }
    if let Some(workers) = settings.max_workers {
        cmd = cmd.arg("--max-workers").arg(workers.to_string());
    }
    if settings.force {
        cmd = cmd.arg("--force");
    }
    if settings.rip_all {
        cmd = cmd.arg("--all");
    }

    cmd.path_arg(video).with_tooling(tooling)
}

/// Installed pgsrip version, as reported by `--version`.
pub async fn version(tooling: &Tooling) -> Result<String> {
    let out = ToolCommand::from_command_line(&tooling.pgsrip_exe, "pgsrip version")
        .arg("--version")
        .output()
        .await?;

    if !out.success() {
        return Err(OcrError::ToolFailed {
            tool: "pgsrip".to_string(),
            code: out.code.unwrap_or(-1),
        });
    }

    parse_version(&out.combined()).ok_or_else(|| OcrError::Tool {
        tool: "pgsrip".to_string(),
        message: format!("unrecognised version output: {}", out.combined().trim()),
    })
}

pub fn parse_version(output: &str) -> Option<String> {
    VERSION.find(output).map(|m| m.as_str().to_string())
}

/// [`SubtitleRipper`] backed by the pgsrip command-line tool
pub struct PgsripRipper {
    tooling: Tooling,
    settings: OcrSettings,
}

impl PgsripRipper {
    pub fn new(tooling: Tooling, settings: OcrSettings) -> Self {
        Self { tooling, settings }
    }
}

#[async_trait]
impl SubtitleRipper for PgsripRipper {
    async fn rip(&self, video: &Path, work_dir: &Path) -> Result<()> {
        let command = build_command(&self.tooling, &self.settings, video).current_dir(work_dir);
        info!("Running: {}", command.display());

        let code = command.stream().await?;
        if code != 0 {
            return Err(OcrError::ToolFailed {
                tool: "pgsrip".to_string(),
                code,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tooling() -> Tooling {
        Tooling {
            tesseract_exe: PathBuf::from("tesseract"),
            mkvtoolnix_dir: None,
            tessdata_prefix: None,
            pgsrip_exe: "pgsrip".to_string(),
        }
    }

    #[test]
    fn test_default_command_line() {
        let cmd = build_command(&tooling(), &OcrSettings::default(), Path::new("movie.mkv"));
        assert_eq!(
            cmd.display(),
            "pgsrip --language en --tag ocr --tag tidy --tag no-sdh --tag no-style \
             --max-workers 4 --force movie.mkv"
        );
    }

    #[test]
    fn test_all_flags() {
        let settings = OcrSettings {
            pgsrip_lang: "ro".to_string(),
            tags: vec!["ocr".to_string()],
            max_workers: None,
            force: false,
            rip_all: true,
            debug_verbose: true,
            keep_temp: true,
            ..OcrSettings::default()
        };
        let cmd = build_command(&tooling(), &settings, Path::new("ep1.mkv"));
        assert_eq!(
            cmd.args,
            vec![
                "--language", "ro", "--verbose", "--debug", "--keep-temp-files", "--tag", "ocr",
                "--all", "ep1.mkv"
            ]
        );
    }

    #[test]
    fn test_module_invocation_prefix() {
        let mut tooling = tooling();
        tooling.pgsrip_exe = "python -m pgsrip".to_string();
        let cmd = build_command(&tooling, &OcrSettings::default(), Path::new("a.mkv"));
        assert_eq!(cmd.program, "python");
        assert_eq!(&cmd.args[..3], &["-m", "pgsrip", "--language"]);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("pgsrip, version 0.1.11\n"), Some("0.1.11".to_string()));
        assert_eq!(parse_version("unknown"), None);
    }
}

// External tool plumbing
//
// Every external program (pgsrip, tesseract, mkvmerge) is driven through
// ToolCommand. Tool folders and TESSDATA_PREFIX are injected into the child
// environment only; the parent environment is never touched.

pub mod mkvtoolnix;
pub mod pgsrip;
pub mod tesseract;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

pub use pgsrip::{PgsripRipper, SubtitleRipper};

use crate::config::Tooling;
use crate::error::{OcrError, Result};

/// Captured result of a finished tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr; some tools print listings on either.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// External command representation
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, OsString)>,
    pub current_dir: Option<PathBuf>,
    pub description: String,
}

impl ToolCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(program: S1, description: S2) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            description: description.into(),
        }
    }

    /// Build from a command line such as `python -m pgsrip`; the first word
    /// is the program, the rest become leading arguments.
    pub fn from_command_line<S: Into<String>>(command_line: &str, description: S) -> Self {
        let mut words = command_line.split_whitespace();
        let program = words.next().unwrap_or_default().to_string();
        Self::new(program, description).args(words)
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn path_arg<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn env<K: Into<String>, V: Into<OsString>>(mut self, key: K, value: V) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add the tool search path and tessdata location for `tooling`.
    pub fn with_tooling(mut self, tooling: &Tooling) -> Self {
        if let Some(path) = tool_search_path(tooling) {
            self = self.env("PATH", path);
        }
        if let Some(tessdata) = &tooling.tessdata_prefix {
            self = self.env("TESSDATA_PREFIX", tessdata.as_os_str());
        }
        self
    }

    /// Printable command line
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        // Own process group: a terminal Ctrl-C must not reach the tool, the
        // batch stops after the current file instead.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        OcrError::Tool {
            tool: self.program.clone(),
            message: e.to_string(),
        }
    }

    /// Run to completion and capture the output.
    pub async fn output(&self) -> Result<ToolOutput> {
        debug!("{}: {}", self.description, self.display());

        let output = self.command().output().await.map_err(|e| self.spawn_error(e))?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run to completion, forwarding stdout and stderr to the log line by
    /// line. Returns the exit code (`-1` when killed by a signal).
    pub async fn stream(&self) -> Result<i32> {
        debug!("{}: {}", self.description, self.display());

        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().map(|s| tokio::spawn(forward_lines(s)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(forward_lines(s)));

        let status = child.wait().await?;
        for task in [stdout, stderr].into_iter().flatten() {
            let _ = task.await;
        }

        Ok(status.code().unwrap_or(-1))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if !line.trim().is_empty() {
                    info!("{}", line);
                }
            }
        }
    }
}

/// `PATH` for child processes: the MKVToolNix folder and the Tesseract
/// folder in front of the inherited search path.
pub fn tool_search_path(tooling: &Tooling) -> Option<OsString> {
    let mut parts: Vec<PathBuf> = Vec::new();
    if let Some(dir) = &tooling.mkvtoolnix_dir {
        parts.push(dir.clone());
    }
    if let Some(parent) = tooling.tesseract_exe.parent().filter(|p| !p.as_os_str().is_empty()) {
        parts.push(parent.to_path_buf());
    }
    if parts.is_empty() {
        return None;
    }
    if let Some(inherited) = std::env::var_os("PATH") {
        parts.extend(std::env::split_paths(&inherited));
    }
    std::env::join_paths(parts).ok()
}

/// Resolve an executable: paths with a directory component must exist as
/// given, bare names are searched on `PATH` (with the platform suffix).
pub fn resolve_executable(exe: &Path) -> Option<PathBuf> {
    if exe.components().count() > 1 {
        return exe.is_file().then(|| exe.to_path_buf());
    }

    let name = exe.as_os_str();
    let mut candidates = vec![PathBuf::from(name)];
    if !std::env::consts::EXE_SUFFIX.is_empty() && exe.extension().is_none() {
        let mut with_suffix = name.to_os_string();
        with_suffix.push(std::env::consts::EXE_SUFFIX);
        candidates.push(PathBuf::from(with_suffix));
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            candidates
                .iter()
                .map(|c| dir.join(c))
                .find(|p| p.is_file())
        })
    })
}

/// Executable name with the platform suffix, e.g. `mkvmerge.exe` on Windows.
pub fn executable_name(stem: &str) -> String {
    format!("{}{}", stem, std::env::consts::EXE_SUFFIX)
}

use std::path::Path;
use tracing::{debug, info};

use super::{resolve_executable, ToolCommand};
use crate::config::Tooling;

/// Outcome of a single setup probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Ok(String),
    /// Usable, but something looks off
    Warning(String),
    Failed(String),
}

impl CheckOutcome {
    pub fn is_usable(&self) -> bool {
        !matches!(self, CheckOutcome::Failed(_))
    }

    pub fn message(&self) -> &str {
        match self {
            CheckOutcome::Ok(m) | CheckOutcome::Warning(m) | CheckOutcome::Failed(m) => m,
        }
    }
}

/// Languages from `tesseract --list-langs`; the header line is skipped.
pub fn parse_list_langs(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.starts_with("List of available languages"))
        .filter(|l| !l.contains(' '))
        .map(str::to_string)
        .collect()
}

/// Check the Tesseract executable runs and knows `lang`.
pub async fn check(tooling: &Tooling, lang: &str) -> CheckOutcome {
    let exe = &tooling.tesseract_exe;
    let Some(resolved) = resolve_executable(exe) else {
        return CheckOutcome::Failed(format!("Tesseract executable not found: {}", exe.display()));
    };
    debug!("Using tesseract at {}", resolved.display());

    let output = ToolCommand::new(resolved.to_string_lossy(), "Tesseract language listing")
        .arg("--list-langs")
        .with_tooling(tooling)
        .output()
        .await;

    match output {
        Ok(out) if out.success() => {
            let langs = parse_list_langs(&out.combined());
            info!("Tesseract languages: {}", langs.join(", "));
            if langs.iter().any(|l| l == lang) {
                CheckOutcome::Ok("Tesseract OK".to_string())
            } else {
                CheckOutcome::Warning(format!(
                    "WARNING: Tesseract language '{}' not present (check TESSDATA_PREFIX).",
                    lang
                ))
            }
        }
        Ok(out) => CheckOutcome::Failed(format!(
            "Failed to run Tesseract: exit code {}: {}",
            out.code.unwrap_or(-1),
            out.stderr.trim()
        )),
        Err(e) => CheckOutcome::Failed(format!("Failed to run Tesseract: {}", e)),
    }
}

/// Problem description when `<lang>.traineddata` is not available in
/// `tessdata`, `None` when it is.
pub fn validate_tessdata(tessdata: Option<&Path>, lang: &str) -> Option<String> {
    let Some(tessdata) = tessdata else {
        return Some(
            "TESSDATA_PREFIX is empty.\n\
             Set TESSDATA_PREFIX=tessdata_best (project-local) and place traineddata files there."
                .to_string(),
        );
    };
    if !tessdata.is_dir() {
        return Some(format!("TESSDATA_PREFIX folder does not exist: {}", tessdata.display()));
    }

    let required = format!("{}.traineddata", lang.trim());
    if !tessdata.join(&required).is_file() {
        return Some(format!(
            "Missing traineddata for TESS_LANG='{}': expected {} in\n{}\n\
             Place the traineddata file(s) into the tessdata folder or run `models download`.",
            lang,
            required,
            tessdata.display()
        ));
    }
    None
}

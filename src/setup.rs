use std::fmt;
use tracing::{info, warn};

use crate::config::Config;
use crate::tools::{mkvtoolnix, pgsrip, tesseract};
use crate::tools::tesseract::CheckOutcome;

/// Findings of a setup check. Problems block a run, warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub problems: Vec<String>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

impl SetupReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    fn push(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Ok(m) => self.notes.push(m),
            CheckOutcome::Warning(m) => self.warnings.push(m),
            CheckOutcome::Failed(m) => self.problems.push(m),
        }
    }

    fn push_problem(&mut self, problem: Option<String>) {
        if let Some(problem) = problem {
            self.problems.push(problem);
        }
    }
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            writeln!(f, "Setup OK: all required tools/data look OK.")?;
        } else {
            writeln!(f, "Setup problems:")?;
            writeln!(f)?;
            writeln!(f, "{}", self.problems.join("\n\n"))?;
        }
        for warning in &self.warnings {
            writeln!(f, "{}", warning)?;
        }
        for note in &self.notes {
            writeln!(f, "{}", note)?;
        }
        Ok(())
    }
}

/// Checks that block a run: MKVToolNix and trained data. Tesseract and
/// pgsrip are only probed by [`SetupChecker::check`].
pub fn preflight(config: &Config) -> SetupReport {
    let mut report = SetupReport::default();
    report.push_problem(mkvtoolnix::validate(config.tooling.mkvtoolnix_dir.as_deref()));
    report.push_problem(tesseract::validate_tessdata(
        config.tooling.tessdata_prefix.as_deref(),
        &config.ocr.tess_lang,
    ));
    report
}

pub struct SetupChecker<'a> {
    config: &'a Config,
}

impl<'a> SetupChecker<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Probe every external dependency and collect all findings.
    pub async fn check(&self) -> SetupReport {
        info!("Checking setup...");
        let tooling = &self.config.tooling;

        let mut report = SetupReport::default();
        report.push(tesseract::check(tooling, &self.config.ocr.tess_lang).await);

        let blocking = preflight(self.config);
        report.problems.extend(blocking.problems);

        report.push(self.check_pgsrip().await);

        for problem in &report.problems {
            warn!("{}", problem);
        }
        report
    }

    async fn check_pgsrip(&self) -> CheckOutcome {
        match pgsrip::version(&self.config.tooling).await {
            Ok(version) if version == pgsrip::PINNED_VERSION => {
                CheckOutcome::Ok(format!("pgsrip {} OK", version))
            }
            Ok(version) => CheckOutcome::Warning(format!(
                "WARNING: pgsrip {} installed, {} expected.",
                version,
                pgsrip::PINNED_VERSION
            )),
            Err(e) => CheckOutcome::Warning(format!(
                "WARNING: could not determine pgsrip version ({}).",
                e
            )),
        }
    }
}

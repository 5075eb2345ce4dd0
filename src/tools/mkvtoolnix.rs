use std::path::{Path, PathBuf};

use super::executable_name;

const TOOLS: [&str; 2] = ["mkvmerge", "mkvextract"];

/// MKVToolNix executables present in `dir`.
pub fn installed_tools(dir: &Path) -> Vec<PathBuf> {
    TOOLS
        .iter()
        .map(|stem| dir.join(executable_name(stem)))
        .filter(|p| p.is_file())
        .collect()
}

/// Problem description when `dir` does not look like an MKVToolNix
/// installation, `None` when it does.
pub fn validate(dir: Option<&Path>) -> Option<String> {
    let Some(dir) = dir else {
        return Some(format!(
            "MKVTOOLNIX_DIR is empty. Expected a folder that contains {} / {}.\n\
             Set MKVTOOLNIX_DIR in .env, the settings file or with --mkvtoolnix-dir.",
            executable_name("mkvmerge"),
            executable_name("mkvextract"),
        ));
    };
    if !dir.is_dir() {
        return Some(format!("MKVToolNix folder does not exist: {}", dir.display()));
    }
    if installed_tools(dir).is_empty() {
        return Some(format!(
            "MKVToolNix folder looks invalid: {}\n\
             Expected {} and/or {} inside that directory.",
            dir.display(),
            executable_name("mkvmerge"),
            executable_name("mkvextract"),
        ));
    }
    None
}

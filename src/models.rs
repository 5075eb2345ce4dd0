use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{OcrError, Result};

pub const DEFAULT_OWNER: &str = "ProXtech-pro";
pub const DEFAULT_REPO: &str = "Subtitle_ocr";
pub const DEFAULT_ASSET: &str = "tessdata_best_min.zip";
pub const TRAINEDDATA_EXT: &str = "traineddata";

const USER_AGENT: &str = "subtitle-ocr-pro";
/// Upper bound for buffer pre-allocation from server-reported sizes.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;
const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub browser_download_url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Pick `asset_name` from the release and return it with its download URL.
pub fn select_asset<'a>(release: &'a Release, asset_name: &str) -> Result<(&'a ReleaseAsset, &'a str)> {
    if release.assets.is_empty() {
        return Err(OcrError::Download("No assets found in latest release.".to_string()));
    }

    let Some(asset) = release.assets.iter().find(|a| a.name == asset_name) else {
        let available = release
            .assets
            .iter()
            .map(|a| if a.name.is_empty() { "?" } else { a.name.as_str() })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(OcrError::Download(format!(
            "Asset not found: {}. Available: {}",
            asset_name, available
        )));
    };

    let url = asset
        .browser_download_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| OcrError::Download("Asset has no browser_download_url.".to_string()))?;

    Ok((asset, url))
}

/// Extract every `*.traineddata` entry of a zip archive, flattened, into
/// `dest_dir`. Returns the extracted file names.
pub fn extract_traineddata(archive: &[u8], dest_dir: &Path) -> Result<Vec<String>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(|e| {
        OcrError::Download(format!("Downloaded asset is not a valid zip: {}", e))
    })?;
    std::fs::create_dir_all(dest_dir)?;

    let mut extracted = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = entry.name().replace('\\', "/");
        if entry.is_dir() || name.ends_with('/') {
            continue;
        }
        let Some(base) = name.rsplit('/').next().filter(|b| !b.is_empty()) else {
            continue;
        };
        if !base.ends_with(&format!(".{}", TRAINEDDATA_EXT)) {
            continue;
        }

        let target = dest_dir.join(base);
        info!("Extracting: {} -> {}", base, target.display());
        let mut file = std::fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut file)?;
        extracted.push(base.to_string());
    }

    if extracted.is_empty() {
        return Err(OcrError::Download("Zip contains no .traineddata files.".to_string()));
    }
    Ok(extracted)
}

/// Installed `*.traineddata` languages in `dir`, sorted.
pub fn list_installed(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut langs: Vec<String> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(TRAINEDDATA_EXT))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();
    langs.sort();
    langs
}

/// Buffer capacity for a download of `hint` bytes as reported by the server.
fn initial_capacity(hint: u64) -> usize {
    hint.min(MAX_PREALLOC) as usize
}

/// Downloads trained Tesseract models published as a GitHub release asset
pub struct ModelDownloader {
    client: Client,
    owner: String,
    repo: String,
    asset_name: String,
}

impl ModelDownloader {
    pub fn new<S1, S2, S3>(owner: S1, repo: S2, asset_name: S3) -> Result<Self>
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            asset_name: asset_name.into(),
        })
    }

    pub fn latest_release_url(&self) -> String {
        format!("{}/repos/{}/{}/releases/latest", GITHUB_API, self.owner, self.repo)
    }

    async fn latest_release(&self) -> Result<Release> {
        let url = self.latest_release_url();
        info!("GitHub API: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OcrError::Download(format!(
                "Failed to query latest release: HTTP {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn fetch(&self, url: &str, expected_size: Option<u64>) -> Result<Vec<u8>> {
        let mut response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(OcrError::Download(format!(
                "Failed to download asset: HTTP {}",
                response.status()
            )));
        }

        let total = response.content_length().or(expected_size).unwrap_or(0);
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut blob = Vec::with_capacity(initial_capacity(total));
        while let Some(chunk) = response.chunk().await? {
            blob.extend_from_slice(&chunk);
            pb.set_position(blob.len() as u64);
        }
        pb.finish_and_clear();
        Ok(blob)
    }

    /// Download the asset from the latest release and extract its trained
    /// data into `dest_dir`. Returns the extracted file names.
    pub async fn download(&self, dest_dir: &Path) -> Result<Vec<String>> {
        let release = self.latest_release().await?;
        if let Some(tag) = &release.tag_name {
            info!("Latest release: {}", tag);
        }

        let (asset, url) = select_asset(&release, &self.asset_name)?;
        info!("Downloading asset: {}", asset.name);
        info!("URL: {}", url);

        let blob = self.fetch(url, asset.size).await?;
        let extracted = extract_traineddata(&blob, dest_dir)?;
        info!(
            "OK: extracted {} traineddata file(s) to {}",
            extracted.len(),
            dest_dir.display()
        );
        Ok(extracted)
    }
}

/// Destination for downloaded models: the configured tessdata folder, or
/// `./tessdata_best`.
pub fn download_destination(tessdata_prefix: Option<&Path>) -> PathBuf {
    match tessdata_prefix {
        Some(dir) => dir.to_path_buf(),
        None => {
            warn!("TESSDATA_PREFIX not set; downloading into ./tessdata_best");
            crate::config::project_root().join("tessdata_best")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn release(assets: &[(&str, Option<&str>)]) -> Release {
        Release {
            tag_name: Some("v1".to_string()),
            assets: assets
                .iter()
                .map(|(name, url)| ReleaseAsset {
                    name: name.to_string(),
                    browser_download_url: url.map(str::to_string),
                    size: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_release_json_parses() {
        let json = r#"{"tag_name":"v2","assets":[{"name":"tessdata_best_min.zip","browser_download_url":"https://example.invalid/a.zip","size":42}]}"#;
        let release: Release = serde_json::from_str(json).unwrap();
        let (asset, url) = select_asset(&release, DEFAULT_ASSET).unwrap();
        assert_eq!(asset.size, Some(42));
        assert_eq!(url, "https://example.invalid/a.zip");
    }

    #[test]
    fn test_no_assets() {
        let err = select_asset(&release(&[]), DEFAULT_ASSET).unwrap_err();
        assert!(err.to_string().contains("No assets found"));
    }

    #[test]
    fn test_missing_asset_lists_available() {
        let err = select_asset(&release(&[("a.zip", Some("u")), ("b.zip", None)]), DEFAULT_ASSET)
            .unwrap_err();
        assert!(err.to_string().contains("Available: a.zip, b.zip"));
    }

    #[test]
    fn test_asset_without_url() {
        let err = select_asset(&release(&[(DEFAULT_ASSET, None)]), DEFAULT_ASSET).unwrap_err();
        assert!(err.to_string().contains("browser_download_url"));
    }

    #[test]
    fn test_extracts_nested_traineddata_flat() {
        let dir = tempfile::tempdir().unwrap();
        let archive = zip_with(&[
            ("tessdata_best/", ""),
            ("tessdata_best/eng.traineddata", "eng"),
            ("ron.traineddata", "ron"),
            ("tessdata_best/README.md", "readme"),
        ]);

        let mut extracted = extract_traineddata(&archive, dir.path()).unwrap();
        extracted.sort();
        assert_eq!(extracted, vec!["eng.traineddata", "ron.traineddata"]);
        assert_eq!(std::fs::read(dir.path().join("eng.traineddata")).unwrap(), b"eng");
        assert!(!dir.path().join("README.md").exists());
        assert_eq!(list_installed(dir.path()), vec!["eng", "ron"]);
    }

    #[test]
    fn test_zip_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let archive = zip_with(&[("notes.txt", "x")]);
        let err = extract_traineddata(&archive, dir.path()).unwrap_err();
        assert!(err.to_string().contains("no .traineddata"));
    }

    #[test]
    fn test_invalid_zip() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_traineddata(b"definitely not a zip", dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a valid zip"));
    }

    #[test]
    fn test_reported_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(1024), 1024);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOC as usize);
    }

    #[test]
    fn test_release_url() {
        let downloader = ModelDownloader::new(DEFAULT_OWNER, DEFAULT_REPO, DEFAULT_ASSET).unwrap();
        assert_eq!(
            downloader.latest_release_url(),
            "https://api.github.com/repos/ProXtech-pro/Subtitle_ocr/releases/latest"
        );
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to run {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("{tool} failed (exit code {code})")]
    ToolFailed { tool: String, code: i32 },

    #[error("Setup problems:\n{0}")]
    Setup(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, OcrError>;

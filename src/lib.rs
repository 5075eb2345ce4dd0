//! subtitle-ocr - batch OCR of PGS/SUP subtitles into SRT
//!
//! Drives pgsrip (backed by Tesseract and MKVToolNix) over a folder of video
//! files, collects the generated `.srt` files and grades their quality.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scanner;
pub mod settings;
pub mod setup;
pub mod tools;
pub mod workflow;

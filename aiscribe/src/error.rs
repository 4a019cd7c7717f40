use std::path::PathBuf;

use crate::vendor::Vendor;

/// All errors that can occur in aiscribe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {path}")]
    MediaNotFound { path: PathBuf },

    #[error("not a regular file: {path}")]
    NotAFile { path: PathBuf },

    #[error("unsupported format: \"{0}\" — see MediaConfig for accepted extensions")]
    UnsupportedFormat(String),

    #[error("file too large: {size_mb:.1} MB (limit {limit_mb} MB)")]
    FileTooLarge { size_mb: f64, limit_mb: u64 },

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("audio conversion error: {0}")]
    AudioConvert(String),

    #[error("ffmpeg not found — install with: apt install ffmpeg")]
    FfmpegNotFound,

    #[error("{vendor} API key not set — pass it in the config or the environment")]
    ApiKeyMissing { vendor: Vendor },

    #[error("{vendor} API error: {message}")]
    Vendor {
        vendor: Vendor,
        /// HTTP status of the failing response, when one was received.
        status: Option<u16>,
        /// Vendor-supplied message, preserved verbatim.
        message: String,
    },

    #[error("template not found: \"{0}\"")]
    TemplateNotFound(String),

    #[error("invalid action URI: {0}")]
    InvalidAction(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

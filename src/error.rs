use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the download pipeline
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request for {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Request for {target} failed with no more retries remaining (retry {attempts}/{attempts}): {last_error}")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid vendor URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse vendor response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Malformed line in {}: {line:?}", .path.display())]
    MalformedLine { path: PathBuf, line: String },

    #[error("Malformed line for {name}: {line:?}")]
    InvalidLine { name: String, line: String },

    #[error("Invalid rate limit: {permits} permits per {window_secs}s")]
    InvalidRateLimit { permits: u32, window_secs: u64 },

    #[error("Could not resolve security identifier for {ticker}: {reason}")]
    SecurityId { ticker: String, reason: String },
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

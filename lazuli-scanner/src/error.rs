use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Discovery failed for {url}: {reason}")]
    Discovery { url: String, reason: String },

    #[error("Extraction failed for {url} at step '{step}': {reason}")]
    Extraction {
        url: String,
        step: String,
        reason: String,
    },

    #[error("Failed to write row for {id}: {reason}")]
    Sink { id: String, reason: String },

    #[error("Remote capture failed: {0}")]
    Transport(String),

    #[error("Render step failed: {0}")]
    Render(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

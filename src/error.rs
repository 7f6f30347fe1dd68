use thiserror::Error;

/// Terminal failures of a run. Per-item problems (a bad file name, an
/// invalid vote) are not errors; they are recorded as rejections.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("SVG rendering failed: {0}")]
    Svg(String),

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("No valid logos found in {location}")]
    NoLogos { location: String },

    #[error("{dir} has {found} logo files, expected {expected}")]
    CountMismatch {
        dir: String,
        expected: usize,
        found: usize,
    },

    #[error("Issue #{number} cannot be updated: {reason}")]
    IssueUnavailable { number: u64, reason: String },
}

impl PollError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            PollError::Api { status, .. } => Some(*status),
            PollError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PollError>;

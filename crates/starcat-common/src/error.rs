//! Error types shared across Starcat crates

use thiserror::Error;

/// Result type alias for Starcat operations
pub type Result<T> = std::result::Result<T, StarcatError>;

/// Errors that are not owned by a single pipeline stage
#[derive(Error, Debug)]
pub enum StarcatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl StarcatError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Parse `raw` as an absolute URL, reporting the offending value on failure
    pub fn parse_url(raw: &str) -> Result<url::Url> {
        url::Url::parse(raw).map_err(|e| Self::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
    }
}

//! Error types for VAST loading and extraction.

use thiserror::Error;

use crate::source::BlockedRedirect;

/// Result type for VAST operations.
pub type VastResult<T> = Result<T, VastError>;

/// Errors that can occur while loading or reading a VAST document.
#[derive(Debug, Error)]
pub enum VastError {
    #[error("Invalid XML content in VAST tag: {0}")]
    MalformedInput(String),

    #[error("Could not find a suitable MP4 MediaFile in VAST")]
    NoSuitableMedia,

    #[error("Could not find ClickThrough URL in VAST")]
    MissingClickthrough,

    #[error("No VAST content provided or file type not allowed")]
    EmptyInput,

    #[error("File type not allowed: {0}")]
    UnsupportedUpload(String),

    #[error("Error fetching VAST URL: {0}")]
    FetchFailed(String),

    #[error("VAST URL not allowed: {0}")]
    BlockedUrl(String),
}

impl VastError {
    /// Create a malformed input error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Create a fetch failure error.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed(message.into())
    }
}

impl From<reqwest::Error> for VastError {
    fn from(err: reqwest::Error) -> Self {
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            if let Some(blocked) = cause.downcast_ref::<BlockedRedirect>() {
                return Self::BlockedUrl(blocked.to_string());
            }
            source = cause.source();
        }
        Self::FetchFailed(err.to_string())
    }
}

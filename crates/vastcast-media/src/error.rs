//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while preparing media artifacts.
///
/// Encoder runs do not produce these; they end in a
/// [`RenderOutcome`](crate::render::RenderOutcome).
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("QR encoding failed: {0}")]
    QrEncoding(String),

    #[error("Image write failed: {0}")]
    Image(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<qrcode::types::QrError> for MediaError {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::QrEncoding(err.to_string())
    }
}

impl From<image::ImageError> for MediaError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

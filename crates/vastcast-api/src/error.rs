//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vastcast_media::MediaError;
use vastcast_vast::VastError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for the conversion pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures of a conversion, one per caller-visible category.
///
/// Resolution problems are absent on purpose: the resolver always yields a
/// URL and only logs when it degrades.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid XML content in VAST tag: {0}")]
    MalformedInput(String),

    #[error("Could not find a suitable MP4 MediaFile in VAST")]
    NoSuitableMedia,

    #[error("Could not find ClickThrough URL in VAST")]
    MissingClickthrough,

    #[error("Video encoder unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Video encoding failed: {reason}")]
    EncodeFailed {
        reason: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Video encoding timed out after {timeout_secs} seconds")]
    EncodeTimedOut { timeout_secs: u64, diagnostics: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Error fetching VAST URL: {0}")]
    FetchFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput(_) => "malformed_input",
            PipelineError::NoSuitableMedia => "no_suitable_media",
            PipelineError::MissingClickthrough => "missing_clickthrough",
            PipelineError::EngineUnavailable(_) => "engine_unavailable",
            PipelineError::EncodeFailed { .. } => "encode_failed",
            PipelineError::EncodeTimedOut { .. } => "encode_timed_out",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::FetchFailed(_) => "fetch_failed",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Encoder output excerpt, when the failure came from the encoder.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            PipelineError::EncodeFailed { diagnostics, .. }
            | PipelineError::EncodeTimedOut { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::MalformedInput(_) | PipelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PipelineError::NoSuitableMedia | PipelineError::MissingClickthrough => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PipelineError::FetchFailed(_) | PipelineError::EncodeFailed { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::EncodeTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<VastError> for PipelineError {
    fn from(err: VastError) -> Self {
        match err {
            VastError::MalformedInput(msg) => Self::MalformedInput(msg),
            VastError::NoSuitableMedia => Self::NoSuitableMedia,
            VastError::MissingClickthrough => Self::MissingClickthrough,
            VastError::EmptyInput | VastError::UnsupportedUpload(_) | VastError::BlockedUrl(_) => {
                Self::InvalidInput(err.to_string())
            }
            VastError::FetchFailed(msg) => Self::FetchFailed(msg),
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Pipeline(err) => err.status_code(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal",
            ApiError::Pipeline(err) => err.code(),
        }
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_) | ApiError::Pipeline(PipelineError::Internal(_))
        )
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let diagnostics = match &self {
            ApiError::Pipeline(err) => err.diagnostics().map(str::to_string),
            _ => None,
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
            diagnostics,
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::RateLimited) {
            response
                .headers_mut()
                .insert("Retry-After", axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}

//! Ad manifest extracted from a VAST document.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Title used when the document has no usable `AdTitle`.
pub const DEFAULT_AD_TITLE: &str = "Untitled Ad";

/// MIME type a `MediaFile` must carry to be selected.
pub const MP4_MIME_TYPE: &str = "video/mp4";

/// The three values the converter needs from a VAST ad.
///
/// Built once per request by the extractor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AdManifest {
    /// Ad title, or [`DEFAULT_AD_TITLE`]
    pub title: String,
    /// URL of the first `video/mp4` media file
    pub media_file_url: String,
    /// Clickthrough exactly as it appears in the document
    pub raw_clickthrough_url: String,
}

impl AdManifest {
    /// Create a manifest, falling back to the default title when `title` is blank.
    pub fn new(
        title: impl Into<String>,
        media_file_url: impl Into<String>,
        raw_clickthrough_url: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            DEFAULT_AD_TITLE.to_string()
        } else {
            title
        };

        Self {
            title,
            media_file_url: media_file_url.into(),
            raw_clickthrough_url: raw_clickthrough_url.into(),
        }
    }
}

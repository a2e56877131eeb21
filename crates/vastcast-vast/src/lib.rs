//! VAST document handling.
//!
//! This crate provides:
//! - Extraction of the ad title, MP4 media file and clickthrough from VAST XML
//! - Loading VAST text from an upload, pasted text or a remote URL

pub mod error;
pub mod extract;
pub mod source;

pub use error::{VastError, VastResult};
pub use extract::extract_manifest;
pub use source::{
    VastFetcher, VastSource, ALLOWED_UPLOAD_EXTENSIONS, DEFAULT_FETCH_TIMEOUT, MAX_FETCH_REDIRECTS,
};

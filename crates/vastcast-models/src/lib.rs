//! Shared data models for the VAST to CTV video converter.
//!
//! This crate provides Serde-serializable types for:
//! - The ad manifest extracted from VAST XML
//! - Brand name derivation from ad titles
//! - Resolved clickthrough destinations
//! - Encoding configuration
//! - Generated artifact naming

pub mod artifact;
pub mod brand;
pub mod destination;
pub mod encoding;
pub mod manifest;

// Re-export common types
pub use artifact::{secure_filename, ArtifactNames};
pub use brand::{BrandName, BrandRule, DEFAULT_BRAND};
pub use destination::ResolvedDestination;
pub use encoding::EncodingConfig;
pub use manifest::{AdManifest, DEFAULT_AD_TITLE, MP4_MIME_TYPE};

//! Names of the files a conversion writes to the shared output directory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::brand::BrandName;

/// Fallback stem when a brand sanitizes to nothing.
const FALLBACK_STEM: &str = "brand";

/// Filenames generated for one conversion.
///
/// All three share a random job token so concurrent conversions never
/// overwrite each other's files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNames {
    /// Random token identifying the conversion
    pub job_id: String,
    /// QR code bitmap
    pub qr_code: String,
    /// Composited video
    pub video: String,
    /// Encoder log
    pub log: String,
}

impl ArtifactNames {
    /// Generate names with a fresh random token.
    pub fn generate(brand: &BrandName) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self::with_token(brand, &token[..8])
    }

    /// Build names from a known token.
    pub fn with_token(brand: &BrandName, token: &str) -> Self {
        let stem = secure_filename(brand.as_str());
        let stem = if stem.is_empty() {
            FALLBACK_STEM.to_string()
        } else {
            stem
        };
        let video = format!("output_{stem}_{token}.mp4");

        Self {
            job_id: token.to_string(),
            qr_code: format!("qrcode_{token}.png"),
            log: format!("{video}.log"),
            video,
        }
    }
}

/// Reduce a string to a safe single path component.
///
/// Non-ASCII characters are dropped, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9._-]` is removed and leading/trailing `.`/`_` are
/// stripped. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let joined = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    filtered.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("The Home Depot"), "The_Home_Depot");
        assert_eq!(secure_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(secure_filename("Café Ōsaka"), "Caf_saka");
        assert_eq!(secure_filename("  "), "");
    }

    #[test]
    fn test_names_share_token() {
        let brand = BrandName::from_title("ABC_Nike_Campaign");
        let names = ArtifactNames::with_token(&brand, "deadbeef");
        assert_eq!(names.video, "output_Nike_deadbeef.mp4");
        assert_eq!(names.log, "output_Nike_deadbeef.mp4.log");
        assert_eq!(names.qr_code, "qrcode_deadbeef.png");
        assert_eq!(names.job_id, "deadbeef");
    }

    #[test]
    fn test_generated_names_are_unique() {
        let brand = BrandName::from_title("ABC_Nike_Campaign");
        let a = ArtifactNames::generate(&brand);
        let b = ArtifactNames::generate(&brand);
        assert_ne!(a.video, b.video);
        assert_eq!(a.job_id.len(), 8);
    }

    #[test]
    fn test_unsanitizable_brand_uses_fallback() {
        let brand = BrandName::from_title("___");
        let names = ArtifactNames::with_token(&brand, "00000000");
        assert_eq!(names.video, "output_brand_00000000.mp4");
    }
}

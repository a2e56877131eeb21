//! QR code bitmap generation.

use std::path::{Path, PathBuf};

use image::Luma;
use qrcode::{EcLevel, QrCode};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Pixels per QR module.
const MODULE_PIXELS: u32 = 10;

/// Encode `data` as a PNG QR code at `path`.
///
/// Medium error correction with a four-module quiet zone. Runs on the
/// blocking pool since encoding and PNG compression are CPU-bound.
pub async fn generate_qr_code(data: &str, path: impl AsRef<Path>) -> MediaResult<PathBuf> {
    let data = data.to_string();
    let path = path.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || {
        write_qr_png(&data, &path)?;
        Ok(path)
    })
    .await
    .map_err(|e| MediaError::internal(format!("QR task failed: {e}")))?
}

fn write_qr_png(data: &str, path: &Path) -> MediaResult<()> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;
    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(MODULE_PIXELS, MODULE_PIXELS)
        .quiet_zone(true)
        .build();
    image.save(path)?;

    debug!(
        path = %path.display(),
        width = image.width(),
        version = ?code.version(),
        "Generated QR code"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn decode(path: &Path) -> String {
        let img = image::open(path).unwrap().to_luma8();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            img.width() as usize,
            img.height() as usize,
            |x, y| img.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one QR code");
        let (_meta, content) = grids[0].decode().unwrap();
        content
    }

    #[tokio::test]
    async fn test_qr_encodes_raw_clickthrough() {
        let dir = TempDir::new().unwrap();
        let raw = "https://track.example/c?cid=1&click=https%3A%2F%2Fwww.homedepot.com%2F";

        let path = generate_qr_code(raw, dir.path().join("qrcode_test.png")).await.unwrap();

        assert_eq!(decode(&path), raw);
    }

    #[tokio::test]
    async fn test_qr_is_png() {
        let dir = TempDir::new().unwrap();
        let path = generate_qr_code("https://brand.example/", dir.path().join("qr.png"))
            .await
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn test_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let result = generate_qr_code("https://brand.example/", dir.path().join("missing/qr.png")).await;
        assert!(matches!(result, Err(MediaError::Image(_))));
    }
}

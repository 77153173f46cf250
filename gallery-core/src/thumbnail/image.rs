//! Photo thumbnailing: decode, resize to a fixed width, encode to lossy
//! WebP at a quality tier scaled down for very large source images so a
//! 48MP photo doesn't produce an oversized thumbnail file.

use std::path::Path;

use image::imageops::FilterType;
use image::GenericImageView;
use tracing::warn;

use crate::error::{GalleryError, Result};

const THUMB_WIDTH: u32 = 500;
const FALLBACK_QUALITY: f32 = 60.0;

fn quality_for_pixel_count(pixels: u64) -> f32 {
    if pixels > 8_000_000 {
        65.0
    } else if pixels > 2_000_000 {
        70.0
    } else {
        80.0
    }
}

/// Generates a WebP thumbnail for the photo at `source`, writing it to
/// `dest`. On a decode failure the source is retried once at the fallback
/// quality (accepting any ICC/metadata warnings logged during the retry) —
/// a photo that merely generates warnings on the primary attempt is still
/// thumbnailed rather than treated as corrupt.
pub fn generate(source: &Path, dest: &Path) -> Result<()> {
    let (img, used_fallback) = match image::open(source) {
        Ok(img) => (img, false),
        Err(primary_err) => {
            warn!(?source, error = %primary_err, "primary decode failed, retrying");
            let img = image::ImageReader::open(source)
                .map_err(GalleryError::Io)?
                .with_guessed_format()
                .map_err(GalleryError::Io)?
                .decode()
                .map_err(|e| GalleryError::Internal(format!("photo decode failed: {e}")))?;
            (img, true)
        }
    };

    let (width, height) = img.dimensions();
    let pixels = width as u64 * height as u64;
    let quality = if used_fallback || pixels == 0 { FALLBACK_QUALITY } else { quality_for_pixel_count(pixels) };

    let thumb_height = if width == 0 { height } else { (height as u64 * THUMB_WIDTH as u64 / width as u64) as u32 };
    let resized = img.resize(THUMB_WIDTH, thumb_height.max(1), FilterType::Lanczos3);
    let rgba = resized.to_rgba8();

    let encoder = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height());
    let encoded = encoder.encode(quality);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &*encoded)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_tiers_scale_down_for_large_images() {
        assert_eq!(quality_for_pixel_count(100_000), 80.0);
        assert_eq!(quality_for_pixel_count(3_000_000), 70.0);
        assert_eq!(quality_for_pixel_count(20_000_000), 65.0);
    }

    #[test]
    fn generates_thumbnail_for_small_png() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.png");
        let dest = tmp.path().join("thumb.webp");
        let img = image::RgbImage::from_pixel(800, 600, image::Rgb([10, 20, 30]));
        img.save(&src).unwrap();

        generate(&src, &dest).unwrap();
        assert!(dest.exists());
        assert!(std::fs::metadata(&dest).unwrap().len() > 0);
    }
}

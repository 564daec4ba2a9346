//! Cover image normalisation
//!
//! Before a cover is embedded it is re-encoded to the MIME type the container
//! declares for it, but only when the formats differ.

use crate::error::{MetadataError, Result, WriteError};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// MIME type of encoded image bytes, sniffed from the header
pub fn image_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// File extension used for a new cover entry
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "img",
    }
}

/// Re-encode `bytes` as `target_mime` unless they already are
pub fn normalize_cover(bytes: &[u8], target_mime: &str) -> Result<Vec<u8>> {
    let target = ImageFormat::from_mime_type(target_mime).ok_or_else(|| {
        MetadataError::Unsupported(format!("cover image type {target_mime}"))
    })?;

    if image::guess_format(bytes).ok() == Some(target) {
        return Ok(bytes.to_vec());
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| WriteError::EncodingFailed(format!("Cannot decode cover image: {e}")))?;

    // JPEG has no alpha channel
    let decoded = match target {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(decoded.to_rgb8()),
        _ => decoded,
    };

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, target)
        .map_err(|e| WriteError::EncodingFailed(format!("Cannot encode cover as {target_mime}: {e}")))?;

    tracing::debug!("Re-encoded cover as {}", target_mime);
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 6, image::Rgb([200, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_same_format_is_untouched() {
        let png = png_bytes();
        assert_eq!(normalize_cover(&png, "image/png").unwrap(), png);
    }

    #[test]
    fn test_reencodes_to_declared_type() {
        let jpeg = normalize_cover(&png_bytes(), "image/jpeg").unwrap();
        assert_eq!(image_mime_type(&jpeg), Some("image/jpeg"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(normalize_cover(b"not an image", "image/png").is_err());
        assert!(normalize_cover(&png_bytes(), "text/plain").is_err());
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
    }
}

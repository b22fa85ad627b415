//! Image preparation before OCR submission.
//!
//! The recognition provider rejects requests past a per-side pixel ceiling,
//! so oversized photos are downscaled (aspect preserved) and re-encoded as
//! lossy JPEG before upload.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use super::RecognitionError;

/// Downscale the image so neither side exceeds `max_dimension`, preserving
/// aspect ratio. Images already within the limit are returned unchanged.
pub fn downscale_if_needed(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width <= max_dimension && height <= max_dimension {
        return image;
    }

    // resize() caps both sides at the given bounds while keeping aspect.
    let resized = image.resize(max_dimension, max_dimension, FilterType::Triangle);
    debug!(
        "Downscaled image from {}x{} to {}x{}",
        width,
        height,
        resized.width(),
        resized.height()
    );
    resized
}

/// Encode the image as JPEG at the given quality (0-100).
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, RecognitionError> {
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    // JPEG has no alpha channel; flatten before encoding.
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| RecognitionError::ImageEncoding(e.to_string()))?;
    Ok(bytes)
}

/// Wrap encoded JPEG bytes in the base64 data URI the provider expects.
pub fn to_data_uri(jpeg_bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_image_is_untouched() {
        let img = DynamicImage::new_rgb8(640, 480);
        let out = downscale_if_needed(img, 3000);
        assert_eq!((out.width(), out.height()), (640, 480));
    }

    #[test]
    fn wide_image_is_capped_preserving_aspect() {
        let img = DynamicImage::new_rgb8(6000, 3000);
        let out = downscale_if_needed(img, 3000);
        assert_eq!(out.width(), 3000);
        assert_eq!(out.height(), 1500);
    }

    #[test]
    fn tall_image_is_capped_preserving_aspect() {
        let img = DynamicImage::new_rgb8(1500, 4500);
        let out = downscale_if_needed(img, 3000);
        assert_eq!(out.width(), 1000);
        assert_eq!(out.height(), 3000);
    }

    #[test]
    fn jpeg_encoding_produces_jpeg_magic_bytes() {
        let img = DynamicImage::new_rgb8(8, 8);
        let bytes = encode_jpeg(&img, 70).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn data_uri_has_expected_prefix() {
        let uri = to_data_uri(&[1, 2, 3]);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }
}

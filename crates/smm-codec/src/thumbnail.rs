//! Thumbnail normalization and secondary encodings.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use smm_core::{Error, Result, ThumbnailKind};

/// JPEG quality used for every stored thumbnail.
pub const JPEG_QUALITY: u8 = 95;

/// Re-encodes a stored JPEG thumbnail into a secondary image format.
///
/// Implementations must be pure: the same input always yields the same
/// output and nothing outside the returned buffer changes.
pub trait ThumbnailTranscoder: Send + Sync {
    fn transcode(&self, jpeg: &[u8]) -> Result<Vec<u8>>;
}

/// Lossless WebP re-encoding via `image`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpTranscoder;

impl ThumbnailTranscoder for WebpTranscoder {
    fn transcode(&self, jpeg: &[u8]) -> Result<Vec<u8>> {
        let img = image::load_from_memory(jpeg)
            .map_err(|e| Error::BrokenThumbnail(e.to_string()))?;
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut out = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::WebP)
            .map_err(|e| Error::Internal(format!("webp encode failed: {e}")))?;
        Ok(out)
    }
}

/// Decode `buf` (any format `image` understands), fit it to the slot size
/// and re-encode as JPEG.
///
/// With `clip` the image is scaled to cover the slot and cropped; without
/// it the image is stretched to the exact size.
pub fn normalize(buf: &[u8], kind: ThumbnailKind, clip: bool) -> Result<Vec<u8>> {
    let img = image::load_from_memory(buf).map_err(|e| Error::BrokenThumbnail(e.to_string()))?;
    let (width, height) = kind.dimensions();
    let resized = if clip {
        img.resize_to_fill(width, height, FilterType::Lanczos3)
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };
    encode_jpeg(&resized)
}

pub(crate) fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| Error::Internal(format!("jpeg encode failed: {e}")))?;
    Ok(out)
}

/// Whether `buf` is a non-empty, decodable image.
pub fn is_decodable(buf: &[u8]) -> bool {
    !buf.is_empty() && image::load_from_memory(buf).is_ok()
}

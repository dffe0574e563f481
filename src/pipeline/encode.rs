//! Image encoding: `DynamicImage` → PNG bytes, and bytes → data URLs.
//!
//! Every raster this crate produces (recovered figure snapshots, full-page
//! vision captures, re-encoded embedded images) is PNG. PNG is lossless, so
//! small print in a diagram survives for the downstream vision model.

use crate::model::ImageFormat;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// A white PNG of the given size (each side at least 1 px).
pub fn blank_png(width: u32, height: u32) -> Result<Vec<u8>, image::ImageError> {
    let img = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([255, 255, 255]));
    encode_png(&DynamicImage::ImageRgb8(img))
}

/// `data:` URL for inline submission to a multimodal API.
pub fn data_url(bytes: &[u8], format: ImageFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}

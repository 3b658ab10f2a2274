//! Image codec — upload bytes to RGB pixel grids and back to JPEG.

use crate::types::PixelGrid;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

/// JPEG quality for full face-swap responses.
pub const FULL_QUALITY: u8 = 95;
/// JPEG quality for preview responses.
pub const PREVIEW_QUALITY: u8 = 80;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("empty image buffer")]
    Empty,
    #[error("invalid image format: {0}")]
    Decode(#[source] image::ImageError),
    #[error("jpeg encoding failed: {0}")]
    Encode(#[source] image::ImageError),
}

/// Decode an uploaded buffer into an RGB pixel grid.
///
/// Empty input is rejected before the decoder runs. Any format the `image`
/// crate recognises is accepted; alpha and grayscale are converted to RGB.
pub fn decode(bytes: &[u8]) -> Result<PixelGrid, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    let img = image::load_from_memory(bytes).map_err(CodecError::Decode)?;
    Ok(img.to_rgb8())
}

/// Encode a pixel grid as baseline JPEG. `quality` is clamped to 1..=100.
pub fn encode_jpeg(grid: &PixelGrid, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    grid.write_with_encoder(encoder).map_err(CodecError::Encode)?;
    Ok(out)
}

//! Encoding of final renders into image files.
//!
//! PNG keeps the alpha channel, so rounded corners survive export. JPEG has
//! no alpha; transparent regions are flattened over white before encoding.

mod jpeg;
mod png;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{PixelBuffer, PixelFormat};

pub use jpeg::{encode_jpeg, flatten_over};
pub use png::encode_png;

/// JPEG quality used when a configured format omits it.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Errors that can occur while encoding a buffer.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Only RGBA buffers can be exported
    #[error("Cannot encode a {0:?} buffer")]
    UnsupportedFormat(PixelFormat),

    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// The codec rejected the image
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeFormat {
    /// Lossless PNG with alpha.
    #[default]
    Png,
    /// Lossy JPEG, quality 1-100.
    Jpeg {
        #[serde(default = "default_jpeg_quality")]
        quality: u8,
    },
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl EncodeFormat {
    /// Conventional file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            EncodeFormat::Png => "png",
            EncodeFormat::Jpeg { .. } => "jpg",
        }
    }
}

/// Encode `buffer` in the requested format.
///
/// # Errors
///
/// Returns `EncodeError` if the buffer is empty, not RGBA, or the codec fails.
pub fn encode(buffer: &PixelBuffer, format: EncodeFormat) -> Result<Vec<u8>, EncodeError> {
    match format {
        EncodeFormat::Png => encode_png(buffer),
        EncodeFormat::Jpeg { quality } => encode_jpeg(buffer, quality),
    }
}

/// Shared validation for both encoders.
fn validate(buffer: &PixelBuffer) -> Result<(), EncodeError> {
    if buffer.width == 0 || buffer.height == 0 {
        return Err(EncodeError::InvalidDimensions {
            width: buffer.width,
            height: buffer.height,
        });
    }
    if buffer.format != PixelFormat::Rgba8 {
        return Err(EncodeError::UnsupportedFormat(buffer.format));
    }
    let expected = buffer.pixel_count() * 4;
    if buffer.samples.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: buffer.samples.len(),
        });
    }
    Ok(())
}

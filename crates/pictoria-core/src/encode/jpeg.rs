//! JPEG encoding for export.
//!
//! JPEG carries no alpha channel, so the RGBA buffer is composited over a
//! solid background first.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{validate, EncodeError};
use crate::buffer::PixelBuffer;

const WHITE: [u8; 3] = [255, 255, 255];

/// Composite RGBA `samples` over an opaque `background`, producing RGB.
pub fn flatten_over(samples: &[u8], background: [u8; 3]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(samples.len() / 4 * 3);
    for px in samples.chunks_exact(4) {
        let alpha = px[3] as u32;
        for c in 0..3 {
            let blended = px[c] as u32 * alpha + background[c] as u32 * (255 - alpha);
            rgb.push(((blended + 127) / 255) as u8);
        }
    }
    rgb
}

/// Encode an RGBA buffer to JPEG bytes, flattening alpha over white.
///
/// # Arguments
///
/// * `buffer` - RGBA pixel buffer
/// * `quality` - JPEG quality (1-100, where 100 is highest quality)
///
/// # Errors
///
/// Returns `EncodeError` for empty or non-RGBA buffers, or if the JPEG
/// encoder fails.
pub fn encode_jpeg(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>, EncodeError> {
    validate(buffer)?;

    let rgb = flatten_over(&buffer.samples, WHITE);
    let quality = quality.clamp(1, 100);

    let mut output = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut output, quality)
        .write_image(&rgb, buffer.width, buffer.height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_jpeg_basic() {
        let buf = PixelBuffer::filled(100, 100, [128, 128, 128, 255]);
        let jpeg_bytes = encode_jpeg(&buf, 90).unwrap();

        // SOI and EOI markers
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);
        let len = jpeg_bytes.len();
        assert_eq!(&jpeg_bytes[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_quality_clamping() {
        let buf = PixelBuffer::filled(10, 10, [128, 128, 128, 255]);
        assert!(encode_jpeg(&buf, 0).is_ok());
        assert!(encode_jpeg(&buf, 255).is_ok());
    }

    #[test]
    fn test_transparent_flattens_to_white() {
        let buf = PixelBuffer::filled(16, 16, [0, 0, 0, 0]);
        let bytes = encode_jpeg(&buf, 95).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().into_rgb8();
        for px in decoded.pixels() {
            assert!(px.0.iter().all(|&c| c >= 250), "got {:?}", px.0);
        }
    }

    #[test]
    fn test_flatten_over() {
        let samples = [255, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0, 128];
        let rgb = flatten_over(&samples, WHITE);
        assert_eq!(&rgb[0..3], &[255, 0, 0]);
        assert_eq!(&rgb[3..6], &[255, 255, 255]);
        assert_eq!(&rgb[6..9], &[127, 127, 127]);
    }
}

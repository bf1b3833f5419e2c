//! PNG encoding for export.

use std::io::Cursor;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::{validate, EncodeError};
use crate::buffer::PixelBuffer;

/// Encode an RGBA buffer to PNG bytes, alpha included.
///
/// # Errors
///
/// Returns `EncodeError` for empty or non-RGBA buffers, or if the PNG
/// encoder fails.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, EncodeError> {
    validate(buffer)?;

    let mut output = Cursor::new(Vec::new());
    PngEncoder::new(&mut output)
        .write_image(
            &buffer.samples,
            buffer.width,
            buffer.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(output.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_preserves_pixels_and_alpha() {
        let mut buf = PixelBuffer::filled(4, 2, [200, 100, 50, 255]);
        let idx = buf.offset(0, 0);
        buf.samples[idx..idx + 4].copy_from_slice(&[0, 0, 0, 0]);

        let bytes = encode_png(&buf).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();

        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.as_raw(), &buf.samples);
    }
}

//! Decoding from encoded bytes with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::ImageReader;

use super::{DecodeError, Orientation, SourceImage};
use crate::buffer::PixelBuffer;
use crate::transform::{apply_geometry, InterpolationFilter};

/// Decode a JPEG or PNG from bytes into an upright RGBA source image.
///
/// # Arguments
///
/// * `bytes` - Raw file bytes
///
/// # Returns
///
/// A `SourceImage` with the EXIF orientation applied to its pixels.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` for empty input or an unknown format,
/// and `DecodeError::CorruptedFile` if the codec fails.
pub fn decode_image(bytes: &[u8]) -> Result<SourceImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::InvalidFormat);
    }

    let orientation = get_orientation(bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let stored = PixelBuffer::from_rgba_image(img.into_rgba8());
    let buffer = upright(stored, orientation)?;
    tracing::debug!(
        width = buffer.width,
        height = buffer.height,
        ?orientation,
        "decoded source image"
    );

    Ok(SourceImage {
        buffer,
        orientation,
    })
}

/// Read the EXIF orientation tag.
///
/// Returns `Orientation::Normal` if there is no EXIF data or no tag.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .map(Orientation::from)
        .unwrap_or_default()
}

/// Turn stored pixels upright. Quarter turns and flips are exact.
fn upright(stored: PixelBuffer, orientation: Orientation) -> Result<PixelBuffer, DecodeError> {
    if orientation == Orientation::Normal {
        return Ok(stored);
    }
    apply_geometry(
        &stored,
        &orientation.upright_transform(),
        InterpolationFilter::Nearest,
    )
    .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_jpeg, encode_png};

    fn pixels(width: u32, height: u32, colors: &[[u8; 4]]) -> PixelBuffer {
        let samples = colors.iter().flatten().copied().collect();
        PixelBuffer::new(width, height, crate::buffer::PixelFormat::Rgba8, samples).unwrap()
    }

    const R: [u8; 4] = [255, 0, 0, 255];
    const G: [u8; 4] = [0, 255, 0, 255];
    const B: [u8; 4] = [0, 0, 255, 255];
    const Y: [u8; 4] = [255, 255, 0, 255];

    // ===== decode_image =====

    #[test]
    fn test_decode_png() {
        let mut buf = PixelBuffer::filled(5, 3, [10, 20, 30, 255]);
        let idx = buf.offset(4, 2);
        buf.samples[idx + 3] = 0;
        let bytes = encode_png(&buf).unwrap();

        let src = decode_image(&bytes).unwrap();
        assert_eq!(src.buffer, buf);
        assert_eq!(src.orientation, Orientation::Normal);
    }

    #[test]
    fn test_decode_jpeg() {
        let buf = PixelBuffer::filled(16, 8, [128, 128, 128, 255]);
        let bytes = encode_jpeg(&buf, 95).unwrap();

        let src = decode_image(&bytes).unwrap();
        assert_eq!(src.dimensions(), (16, 8));
        assert!(src.buffer.is_opaque());
    }

    #[test]
    fn test_decode_empty_bytes() {
        assert!(matches!(decode_image(&[]), Err(DecodeError::InvalidFormat)));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_image(&[0x00, 0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn test_decode_truncated() {
        let buf = PixelBuffer::filled(16, 16, [1, 2, 3, 255]);
        let bytes = encode_png(&buf).unwrap();
        assert!(decode_image(&bytes[..bytes.len() / 2]).is_err());
    }

    // ===== orientation =====

    #[test]
    fn test_orientation_without_exif() {
        let bytes = encode_png(&PixelBuffer::filled(2, 2, [0, 0, 0, 255])).unwrap();
        assert_eq!(get_orientation(&bytes), Orientation::Normal);
        assert_eq!(get_orientation(&[0x00, 0x01]), Orientation::Normal);
    }

    #[test]
    fn test_upright_rotate90() {
        let out = upright(pixels(2, 1, &[R, G]), Orientation::Rotate90CW).unwrap();
        assert_eq!((out.width, out.height), (1, 2));
        assert_eq!(out.pixel(0, 0), &R);
        assert_eq!(out.pixel(0, 1), &G);
    }

    #[test]
    fn test_upright_rotate180() {
        let out = upright(pixels(2, 1, &[R, G]), Orientation::Rotate180).unwrap();
        assert_eq!(out.pixel(0, 0), &G);
        assert_eq!(out.pixel(1, 0), &R);
    }

    #[test]
    fn test_upright_transpose() {
        // R G / B Y -> R B / G Y
        let out = upright(pixels(2, 2, &[R, G, B, Y]), Orientation::Transpose).unwrap();
        assert_eq!(out, pixels(2, 2, &[R, B, G, Y]));
    }

    #[test]
    fn test_upright_transverse() {
        // R G / B Y -> Y G / B R
        let out = upright(pixels(2, 2, &[R, G, B, Y]), Orientation::Transverse).unwrap();
        assert_eq!(out, pixels(2, 2, &[Y, G, B, R]));
    }

    #[test]
    fn test_swapping_orientations_swap_dimensions() {
        for tag in 1..=8u32 {
            let orientation = Orientation::from(tag);
            let out = upright(pixels(3, 1, &[R, G, B]), orientation).unwrap();
            let expected = if orientation.swaps_dimensions() { (1, 3) } else { (3, 1) };
            assert_eq!((out.width, out.height), expected, "tag {}", tag);
        }
    }
}

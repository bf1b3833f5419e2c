//! Owned pixel buffers passed between pipeline stages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing a [`PixelBuffer`] from raw parts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// Sample data length doesn't match the dimensions and format.
    #[error("Invalid sample data: expected {expected} bytes for {width}x{height}, got {actual}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Memory layout of the samples in a [`PixelBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Straight (non-premultiplied) RGBA, 4 bytes per pixel.
    #[default]
    Rgba8,
    /// Single coverage channel, 1 byte per pixel. Used for masks.
    Alpha8,
}

impl PixelFormat {
    /// Number of bytes that make up one pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Alpha8 => 1,
        }
    }

    /// Whether the format carries color channels.
    #[inline]
    pub fn has_color(self) -> bool {
        matches!(self, PixelFormat::Rgba8)
    }
}

/// A raster image in row-major order.
///
/// A buffer is owned by exactly one stage at a time: every stage takes its
/// input by reference and hands back a freshly allocated buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of `samples`.
    pub format: PixelFormat,
    /// Raw samples; length is `width * height * format.bytes_per_pixel()`.
    pub samples: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer, validating that `samples` matches the dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        samples: Vec<u8>,
    ) -> Result<Self, BufferError> {
        let expected = Self::expected_len(width, height, format);
        if samples.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            samples,
        })
    }

    /// Create an RGBA buffer filled with a single color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut samples = Vec::with_capacity(count * 4);
        for _ in 0..count {
            samples.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            samples,
        }
    }

    /// Allocate a fully transparent (all zero) buffer.
    pub fn transparent(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            samples: vec![0; Self::expected_len(width, height, format)],
        }
    }

    /// Wrap an `image::RgbaImage` without copying.
    pub fn from_rgba_image(img: image::RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgba8,
            samples: img.into_raw(),
        }
    }

    /// Convert to an `image::RgbaImage`. Returns `None` for non-RGBA buffers.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        if self.format != PixelFormat::Rgba8 {
            return None;
        }
        image::RgbaImage::from_raw(self.width, self.height, self.samples.clone())
    }

    /// Consume the buffer into an `image::RgbaImage` without copying.
    pub fn into_rgba_image(self) -> Option<image::RgbaImage> {
        if self.format != PixelFormat::Rgba8 {
            return None;
        }
        image::RgbaImage::from_raw(self.width, self.height, self.samples)
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check if this buffer has zero area or no samples.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.samples.is_empty()
    }

    /// Byte offset of the pixel at `(x, y)`.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }

    /// Samples of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let idx = self.offset(x, y);
        &self.samples[idx..idx + bpp]
    }

    /// Copy the alpha channel out into an `Alpha8` buffer.
    pub fn alpha_mask(&self) -> PixelBuffer {
        let samples = match self.format {
            PixelFormat::Rgba8 => self.samples.chunks_exact(4).map(|px| px[3]).collect(),
            PixelFormat::Alpha8 => self.samples.clone(),
        };
        PixelBuffer {
            width: self.width,
            height: self.height,
            format: PixelFormat::Alpha8,
            samples,
        }
    }

    /// True when every pixel is fully opaque.
    pub fn is_opaque(&self) -> bool {
        match self.format {
            PixelFormat::Rgba8 => self.samples.chunks_exact(4).all(|px| px[3] == 255),
            PixelFormat::Alpha8 => self.samples.iter().all(|&a| a == 255),
        }
    }

    fn expected_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        let ok = PixelBuffer::new(2, 3, PixelFormat::Rgba8, vec![0; 24]);
        assert!(ok.is_ok());

        let err = PixelBuffer::new(2, 3, PixelFormat::Rgba8, vec![0; 23]);
        assert_eq!(
            err,
            Err(BufferError::LengthMismatch {
                width: 2,
                height: 3,
                expected: 24,
                actual: 23
            })
        );
    }

    #[test]
    fn test_alpha8_length() {
        let buf = PixelBuffer::new(4, 4, PixelFormat::Alpha8, vec![255; 16]).unwrap();
        assert_eq!(buf.pixel_count(), 16);
        assert!(buf.is_opaque());
    }

    #[test]
    fn test_filled_and_pixel_access() {
        let buf = PixelBuffer::filled(3, 2, [10, 20, 30, 255]);
        assert_eq!(buf.samples.len(), 24);
        assert_eq!(buf.pixel(2, 1), &[10, 20, 30, 255]);
        assert!(buf.is_opaque());
    }

    #[test]
    fn test_empty() {
        assert!(PixelBuffer::transparent(0, 10, PixelFormat::Rgba8).is_empty());
        assert!(!PixelBuffer::transparent(1, 1, PixelFormat::Rgba8).is_empty());
    }

    #[test]
    fn test_alpha_mask_extracts_channel() {
        let mut buf = PixelBuffer::filled(2, 1, [1, 2, 3, 255]);
        buf.samples[7] = 9;
        let mask = buf.alpha_mask();
        assert_eq!(mask.format, PixelFormat::Alpha8);
        assert_eq!(mask.samples, vec![255, 9]);
    }

    #[test]
    fn test_rgba_image_round_trip_keeps_samples() {
        let buf = PixelBuffer::filled(5, 4, [200, 100, 50, 128]);
        let img = buf.to_rgba_image().unwrap();
        assert_eq!(img.dimensions(), (5, 4));
        assert_eq!(PixelBuffer::from_rgba_image(img), buf);
    }

    #[test]
    fn test_alpha_buffer_has_no_rgba_view() {
        let buf = PixelBuffer::transparent(2, 2, PixelFormat::Alpha8);
        assert!(buf.to_rgba_image().is_none());
        assert!(!buf.format.has_color());
    }
}

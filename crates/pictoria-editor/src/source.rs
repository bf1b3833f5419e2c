//! Image sources handed to a new session.
//!
//! A source is consumed by [`ImageSource::acquire`], so each one yields its
//! image exactly once.

use std::fs;
use std::path::PathBuf;

use pictoria_core::{decode_image, DecodeError, PixelBuffer, SourceImage};

/// Something that can supply the image for one editing session.
pub trait ImageSource: Send + 'static {
    /// Produce the upright source image.
    fn acquire(self) -> Result<SourceImage, DecodeError>;
}

/// Encoded JPEG or PNG bytes, e.g. from a photo picker.
#[derive(Debug, Clone)]
pub struct BytesSource(pub Vec<u8>);

impl ImageSource for BytesSource {
    fn acquire(self) -> Result<SourceImage, DecodeError> {
        decode_image(&self.0)
    }
}

/// An image file on disk.
#[derive(Debug, Clone)]
pub struct PathSource(pub PathBuf);

impl ImageSource for PathSource {
    fn acquire(self) -> Result<SourceImage, DecodeError> {
        let bytes = fs::read(&self.0)?;
        tracing::debug!(path = %self.0.display(), bytes = bytes.len(), "read source file");
        decode_image(&bytes)
    }
}

/// An already decoded, upright buffer.
#[derive(Debug, Clone)]
pub struct BufferSource(pub PixelBuffer);

impl ImageSource for BufferSource {
    fn acquire(self) -> Result<SourceImage, DecodeError> {
        Ok(SourceImage::from_buffer(self.0))
    }
}

//! Core types for image decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::transform::TransformParameters;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are empty or not a recognized image format.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the stored pixels relate to the upright image, from the EXIF
/// orientation tag.
///
/// Each variant names the edit that turns the stored pixels upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Tag 1, or no tag at all.
    #[default]
    Normal,
    /// Tag 2.
    FlipHorizontal,
    /// Tag 3.
    Rotate180,
    /// Tag 4.
    FlipVertical,
    /// Tag 5: swap rows and columns.
    Transpose,
    /// Tag 6.
    Rotate90CW,
    /// Tag 7: swap rows and columns across the anti-diagonal.
    Transverse,
    /// Tag 8.
    Rotate270CW,
}

impl Orientation {
    /// True when the upright image is the stored image with width and
    /// height exchanged.
    pub fn swaps_dimensions(self) -> bool {
        self.upright_transform()
            .quarter_turns()
            .is_some_and(|turns| turns % 2 == 1)
    }

    /// Geometry parameters that bring the stored pixels upright.
    ///
    /// Mirroring runs before rotation, so the two diagonal cases mirror
    /// first and then turn.
    pub fn upright_transform(self) -> TransformParameters {
        let (degrees, mirror_horizontal, mirror_vertical) = match self {
            Orientation::Normal => (0.0, false, false),
            Orientation::FlipHorizontal => (0.0, true, false),
            Orientation::Rotate180 => (180.0, false, false),
            Orientation::FlipVertical => (0.0, false, true),
            Orientation::Transpose => (270.0, true, false),
            Orientation::Rotate90CW => (90.0, false, false),
            Orientation::Transverse => (90.0, true, false),
            Orientation::Rotate270CW => (270.0, false, false),
        };
        TransformParameters::new(degrees, mirror_horizontal, mirror_vertical)
    }
}

impl From<u32> for Orientation {
    fn from(tag: u32) -> Self {
        const BY_TAG: [Orientation; 8] = [
            Orientation::Normal,
            Orientation::FlipHorizontal,
            Orientation::Rotate180,
            Orientation::FlipVertical,
            Orientation::Transpose,
            Orientation::Rotate90CW,
            Orientation::Transverse,
            Orientation::Rotate270CW,
        ];
        tag.checked_sub(1)
            .and_then(|i| BY_TAG.get(i as usize))
            .copied()
            .unwrap_or_default()
    }
}

/// A decoded, upright source image ready for editing.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// RGBA pixels with EXIF orientation already applied.
    pub buffer: PixelBuffer,
    /// The orientation tag found in the file.
    pub orientation: Orientation,
}

impl SourceImage {
    /// Wrap an already upright buffer.
    pub fn from_buffer(buffer: PixelBuffer) -> Self {
        Self {
            buffer,
            orientation: Orientation::Normal,
        }
    }

    /// Upright dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.buffer.width, self.buffer.height)
    }
}

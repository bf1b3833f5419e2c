//! Decoding of source images.
//!
//! Sources are decoded into straight RGBA buffers and rotated upright
//! according to their EXIF orientation tag, so editing always starts from
//! the image as the user sees it.

mod orient;
mod types;

pub use orient::{decode_image, get_orientation};
pub use types::{DecodeError, Orientation, SourceImage};

//! Rounded-corner alpha masking.
//!
//! The mask is a rounded rectangle covering the whole canvas. Coverage is
//! evaluated at each pixel center from the signed distance to the rounded
//! rectangle's edge, with a one-pixel anti-aliased ramp, and multiplied into
//! the buffer's alpha channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{PixelBuffer, PixelFormat};

/// Errors produced by the corner stage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    /// The buffer has zero area.
    #[error("Cannot mask an empty buffer ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    /// Masks are multiplied into RGBA buffers only.
    #[error("Cannot mask a {0:?} buffer")]
    UnsupportedFormat(PixelFormat),
}

/// Corner radius in canvas pixels. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct CornerRadius(f32);

impl CornerRadius {
    /// No rounding.
    pub const ZERO: CornerRadius = CornerRadius(0.0);

    /// Create a radius clamped into `[0, max_radius]`. NaN becomes zero.
    pub fn new(radius: f32, max_radius: f32) -> Self {
        if radius.is_nan() {
            return Self::ZERO;
        }
        CornerRadius(radius.clamp(0.0, max_radius.max(0.0)))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    /// The radius clamped to what fits a `width`×`height` canvas.
    pub fn fitted(self, width: u32, height: u32) -> f32 {
        self.0.min(max_radius_for(width, height))
    }

    /// Scale by `factor`, e.g. when rendering at a different resolution.
    pub fn scaled(self, factor: f32) -> Self {
        if factor.is_finite() && factor > 0.0 {
            CornerRadius(self.0 * factor)
        } else {
            self
        }
    }

    pub fn is_zero(self) -> bool {
        self.0 <= 0.0
    }
}

/// Largest radius that fits: half the shorter side.
pub fn max_radius_for(width: u32, height: u32) -> f32 {
    width.min(height) as f32 / 2.0
}

/// Build an `Alpha8` rounded-rectangle mask of the given size.
///
/// `radius` is clamped to `[0, min(width, height) / 2]`.
pub fn rounded_rect_mask(width: u32, height: u32, radius: f32) -> PixelBuffer {
    let radius = radius.clamp(0.0, max_radius_for(width, height));
    let mut mask = PixelBuffer {
        width,
        height,
        format: PixelFormat::Alpha8,
        samples: vec![255; width as usize * height as usize],
    };
    if radius <= 0.0 {
        return mask;
    }

    let (w, h) = (width as f32, height as f32);
    for (idx, coverage) in mask.samples.iter_mut().enumerate() {
        let x = (idx % width as usize) as f32 + 0.5;
        let y = (idx / width as usize) as f32 + 0.5;
        *coverage = (edge_coverage(x, y, w, h, radius) * 255.0).round() as u8;
    }
    mask
}

/// Coverage in `[0, 1]` of the point `(x, y)` by the rounded rectangle.
#[inline]
fn edge_coverage(x: f32, y: f32, w: f32, h: f32, radius: f32) -> f32 {
    // Fold into the top-left quadrant; pixel centers are exact in f32
    let x = x.min(w - x);
    let y = y.min(h - y);
    if x >= radius || y >= radius {
        return 1.0;
    }
    let cx = radius - x;
    let cy = radius - y;

    let distance = (cx * cx + cy * cy).sqrt() - radius;
    (0.5 - distance).clamp(0.0, 1.0)
}

/// Round the corners of `image` by multiplying a rounded-rectangle mask
/// into its alpha channel.
///
/// A zero radius is the identity.
///
/// # Errors
///
/// Returns `MaskError` for empty or non-RGBA buffers.
pub fn apply_corner_mask(
    image: &PixelBuffer,
    radius: CornerRadius,
) -> Result<PixelBuffer, MaskError> {
    if image.is_empty() {
        return Err(MaskError::EmptySource {
            width: image.width,
            height: image.height,
        });
    }
    if image.format != PixelFormat::Rgba8 {
        return Err(MaskError::UnsupportedFormat(image.format));
    }

    let mut output = image.clone();
    let radius = radius.fitted(image.width, image.height);
    if radius <= 0.0 {
        return Ok(output);
    }

    let mask = rounded_rect_mask(image.width, image.height, radius);
    for (px, &coverage) in output.samples.chunks_exact_mut(4).zip(&mask.samples) {
        if coverage != 255 {
            px[3] = ((px[3] as u16 * coverage as u16 + 127) / 255) as u8;
        }
    }
    Ok(output)
}

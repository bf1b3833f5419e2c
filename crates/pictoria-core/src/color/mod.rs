//! Hue, saturation and brightness adjustment.
//!
//! ## Order of Operations
//! 1. Color controls (single pass): saturation scaling around BT.709 luma,
//!    then brightness offset, clamped to `[0, 1]`
//! 2. Hue rotation in YIQ space on the result of step 1
//!
//! Hue rotation does not commute with the color controls, so it always
//! runs last. Alpha passes through untouched.

pub mod space;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{PixelBuffer, PixelFormat};
use space::{calculate_luminance, ColorMatrix};

/// Valid hue rotation range in degrees.
pub const HUE_RANGE: (f32, f32) = (-180.0, 180.0);
/// Valid saturation scale range.
pub const SATURATION_RANGE: (f32, f32) = (0.0, 2.0);
/// Valid brightness offset range, in normalized channel units.
pub const BRIGHTNESS_RANGE: (f32, f32) = (-1.0, 1.0);

/// Errors produced by the color stage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    /// The buffer has zero area.
    #[error("Cannot adjust colors of an empty buffer ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    /// The buffer carries no color channels.
    #[error("Cannot adjust colors of a {0:?} buffer")]
    UnsupportedFormat(PixelFormat),

    /// Sample data length doesn't match the declared dimensions.
    #[error("Malformed buffer: expected {expected} bytes, got {actual}")]
    MalformedSource { expected: usize, actual: usize },
}

/// Hue / saturation / brightness parameters.
///
/// Values are clamped into their ranges on construction, so an instance is
/// always valid. The default is the identity adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColorAdjustmentValues")]
pub struct ColorAdjustment {
    hue_degrees: f32,
    saturation_scale: f32,
    brightness_offset: f32,
}

/// Unvalidated wire form of [`ColorAdjustment`].
#[derive(Deserialize)]
struct ColorAdjustmentValues {
    #[serde(default)]
    hue_degrees: f32,
    #[serde(default = "default_saturation")]
    saturation_scale: f32,
    #[serde(default)]
    brightness_offset: f32,
}

fn default_saturation() -> f32 {
    1.0
}

impl From<ColorAdjustmentValues> for ColorAdjustment {
    fn from(v: ColorAdjustmentValues) -> Self {
        ColorAdjustment::new(v.hue_degrees, v.saturation_scale, v.brightness_offset)
    }
}

impl Default for ColorAdjustment {
    fn default() -> Self {
        Self {
            hue_degrees: 0.0,
            saturation_scale: 1.0,
            brightness_offset: 0.0,
        }
    }
}

impl ColorAdjustment {
    /// Create an adjustment, clamping each value into its range.
    ///
    /// NaN falls back to the identity value for that control.
    pub fn new(hue_degrees: f32, saturation_scale: f32, brightness_offset: f32) -> Self {
        Self {
            hue_degrees: clamp_or(hue_degrees, HUE_RANGE, 0.0),
            saturation_scale: clamp_or(saturation_scale, SATURATION_RANGE, 1.0),
            brightness_offset: clamp_or(brightness_offset, BRIGHTNESS_RANGE, 0.0),
        }
    }

    pub fn hue_degrees(&self) -> f32 {
        self.hue_degrees
    }

    pub fn saturation_scale(&self) -> f32 {
        self.saturation_scale
    }

    pub fn brightness_offset(&self) -> f32 {
        self.brightness_offset
    }

    pub fn with_hue(self, hue_degrees: f32) -> Self {
        Self::new(hue_degrees, self.saturation_scale, self.brightness_offset)
    }

    pub fn with_saturation(self, saturation_scale: f32) -> Self {
        Self::new(self.hue_degrees, saturation_scale, self.brightness_offset)
    }

    pub fn with_brightness(self, brightness_offset: f32) -> Self {
        Self::new(self.hue_degrees, self.saturation_scale, brightness_offset)
    }

    /// Check if all values are at their defaults
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp_or(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

/// Apply a color adjustment, returning a new buffer.
///
/// The identity adjustment returns an exact copy.
///
/// # Errors
///
/// Returns `ColorError` for empty, malformed or alpha-only buffers.
pub fn adjust_colors(
    image: &PixelBuffer,
    adjustment: &ColorAdjustment,
) -> Result<PixelBuffer, ColorError> {
    if image.is_empty() {
        return Err(ColorError::EmptySource {
            width: image.width,
            height: image.height,
        });
    }
    if !image.format.has_color() {
        return Err(ColorError::UnsupportedFormat(image.format));
    }
    let expected = image.pixel_count() * image.format.bytes_per_pixel();
    if image.samples.len() != expected {
        return Err(ColorError::MalformedSource {
            expected,
            actual: image.samples.len(),
        });
    }

    let mut output = image.clone();
    if adjustment.is_identity() {
        return Ok(output);
    }
    apply_adjustment(&mut output.samples, adjustment);
    Ok(output)
}

/// Apply the adjustment to straight RGBA samples in place.
///
/// # Example
/// ```
/// use pictoria_core::color::{apply_adjustment, ColorAdjustment};
///
/// let mut pixels = vec![200, 100, 50, 255];
/// apply_adjustment(&mut pixels, &ColorAdjustment::new(0.0, 0.0, 0.0));
/// // Fully desaturated: all channels equal the pixel's luma
/// assert_eq!(pixels[0], pixels[1]);
/// ```
pub fn apply_adjustment(pixels: &mut [u8], adjustment: &ColorAdjustment) {
    // Early exit if no adjustments
    if adjustment.is_identity() {
        return;
    }

    let hue = (adjustment.hue_degrees != 0.0)
        .then(|| ColorMatrix::hue_rotation(adjustment.hue_degrees));

    for chunk in pixels.chunks_exact_mut(4) {
        let r = chunk[0] as f32 / 255.0;
        let g = chunk[1] as f32 / 255.0;
        let b = chunk[2] as f32 / 255.0;

        let (mut r, mut g, mut b) = apply_color_controls(
            r,
            g,
            b,
            adjustment.saturation_scale,
            adjustment.brightness_offset,
        );

        if let Some(matrix) = &hue {
            (r, g, b) = matrix.apply(r, g, b);
        }

        chunk[0] = to_u8(r);
        chunk[1] = to_u8(g);
        chunk[2] = to_u8(b);
    }
}

/// Saturation then brightness, in one pass.
///
/// Formula: `c' = clamp(luma + (c - luma) * saturation + brightness)`
#[inline]
fn apply_color_controls(
    r: f32,
    g: f32,
    b: f32,
    saturation: f32,
    brightness: f32,
) -> (f32, f32, f32) {
    let luma = calculate_luminance(r, g, b);
    let control = |c: f32| (luma + (c - luma) * saturation + brightness).clamp(0.0, 1.0);
    (control(r), control(g), control(b))
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

//! Rotation and mirroring composed into a single affine resample.
//!
//! # Algorithm
//!
//! The linear part of the transform is built as `R(θ) · V · H`, where `H`
//! mirrors horizontally (x-scale = −1), `V` mirrors vertically (y-scale = −1)
//! and `R(θ)` rotates clockwise on screen (the y axis points down). The
//! output canvas is the bounding box of the transformed source, and the
//! translation maps the source center onto the canvas center so nothing is
//! clipped.
//!
//! Resampling uses inverse mapping: for each destination pixel center we
//! compute the source position and sample it:
//!
//! ```text
//! src = L⁻¹ · (dst - dst_center) + src_center
//! ```
//!
//! When the transform is axis-aligned (quarter turns and mirrors) the
//! inverse lands exactly on source pixel centers, so those cases are
//! resampled with nearest-neighbor and are lossless.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::sampling::{sample, InterpolationFilter};
use crate::buffer::PixelBuffer;

/// Errors produced by the geometry stage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// The source buffer has zero width or height, or no samples.
    #[error("Source buffer is empty ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    /// Sample data length doesn't match the declared dimensions.
    #[error("Malformed source buffer: expected {expected} bytes, got {actual}")]
    MalformedSource { expected: usize, actual: usize },
}

/// A single user-issued geometric edit.
///
/// Edits fold into [`TransformParameters`] via [`TransformParameters::apply`];
/// repeated edits accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImageTransformation {
    /// Quarter turn clockwise (+90°).
    RotateClockwise,
    /// Quarter turn counter-clockwise (−90°).
    RotateCounterClockwise,
    /// Flip left-right.
    MirrorHorizontal,
    /// Flip top-bottom.
    MirrorVertical,
    /// Rotate by an arbitrary angle in degrees, positive = clockwise.
    Rotate(f64),
    /// No change.
    None,
}

/// Accumulated geometric parameters.
///
/// Invariant: `rotation_degrees` is always normalized to `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "TransformValues")]
pub struct TransformParameters {
    rotation_degrees: f64,
    /// Mirror left-right before rotating.
    pub mirror_horizontal: bool,
    /// Mirror top-bottom before rotating.
    pub mirror_vertical: bool,
}

#[derive(Deserialize)]
struct TransformValues {
    #[serde(default)]
    rotation_degrees: f64,
    #[serde(default)]
    mirror_horizontal: bool,
    #[serde(default)]
    mirror_vertical: bool,
}

impl From<TransformValues> for TransformParameters {
    fn from(v: TransformValues) -> Self {
        Self::new(v.rotation_degrees, v.mirror_horizontal, v.mirror_vertical)
    }
}

impl TransformParameters {
    /// Create parameters, normalizing the rotation into `[0, 360)`.
    ///
    /// Non-finite angles are treated as no rotation.
    pub fn new(rotation_degrees: f64, mirror_horizontal: bool, mirror_vertical: bool) -> Self {
        Self {
            rotation_degrees: normalize_degrees(rotation_degrees),
            mirror_horizontal,
            mirror_vertical,
        }
    }

    /// Rotation in degrees, clockwise, in `[0, 360)`.
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    /// Set the rotation, normalizing into `[0, 360)`.
    pub fn set_rotation_degrees(&mut self, degrees: f64) {
        self.rotation_degrees = normalize_degrees(degrees);
    }

    /// Fold a single edit into these parameters.
    pub fn apply(mut self, edit: ImageTransformation) -> Self {
        match edit {
            ImageTransformation::RotateClockwise => {
                self.set_rotation_degrees(self.rotation_degrees + 90.0)
            }
            ImageTransformation::RotateCounterClockwise => {
                self.set_rotation_degrees(self.rotation_degrees - 90.0)
            }
            ImageTransformation::MirrorHorizontal => {
                self.mirror_horizontal = !self.mirror_horizontal
            }
            ImageTransformation::MirrorVertical => self.mirror_vertical = !self.mirror_vertical,
            ImageTransformation::Rotate(degrees) if degrees.is_finite() => {
                self.set_rotation_degrees(self.rotation_degrees + degrees)
            }
            ImageTransformation::Rotate(_) | ImageTransformation::None => {}
        }
        self
    }

    /// Check if these parameters leave the image untouched.
    pub fn is_identity(&self) -> bool {
        self.rotation_degrees == 0.0 && !self.mirror_horizontal && !self.mirror_vertical
    }

    /// The number of clockwise quarter turns, if the rotation is a multiple of 90°.
    pub fn quarter_turns(&self) -> Option<u8> {
        let turns = self.rotation_degrees / 90.0;
        if (turns - turns.round()).abs() < 1e-9 {
            Some((turns.round() as i64).rem_euclid(4) as u8)
        } else {
            None
        }
    }
}

/// Wrap any finite angle into `[0, 360)`.
fn normalize_degrees(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 || (360.0 - wrapped).abs() < 1e-9 || wrapped.abs() < 1e-9 {
        0.0
    } else {
        wrapped
    }
}

/// A 2×3 affine matrix: `[a c tx; b d ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Affine {
    /// The identity transform.
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Axis scale.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Affine {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Pure translation.
    pub fn translate(tx: f64, ty: f64) -> Self {
        Affine {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Clockwise rotation on a y-down canvas.
    ///
    /// Quarter turns use exact coefficients so axis-aligned transforms stay
    /// exact.
    pub fn rotate_degrees(degrees: f64) -> Self {
        let (sin, cos) = match TransformParameters::new(degrees, false, false).quarter_turns() {
            Some(0) => (0.0, 1.0),
            Some(1) => (1.0, 0.0),
            Some(2) => (0.0, -1.0),
            Some(3) => (-1.0, 0.0),
            _ => degrees.to_radians().sin_cos(),
        };
        Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Apply `self`, then `next` (the matrix product `next · self`).
    pub fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    /// Map a point.
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// Inverse transform, or `None` if singular.
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Affine {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }

    /// True when every linear coefficient is exactly −1, 0 or 1 and the
    /// matrix only permutes / flips axes.
    pub fn is_axis_aligned(&self) -> bool {
        let unit = |v: f64| v == 0.0 || v == 1.0 || v == -1.0;
        unit(self.a) && unit(self.b) && unit(self.c) && unit(self.d)
            && ((self.b == 0.0 && self.c == 0.0) || (self.a == 0.0 && self.d == 0.0))
    }

    /// Linear part for the given parameters: mirror-h, then mirror-v, then rotate.
    pub fn from_parameters(params: &TransformParameters) -> Affine {
        let mirror_h = if params.mirror_horizontal { -1.0 } else { 1.0 };
        let mirror_v = if params.mirror_vertical { -1.0 } else { 1.0 };
        Affine::scale(mirror_h, 1.0)
            .then(Affine::scale(1.0, mirror_v))
            .then(Affine::rotate_degrees(params.rotation_degrees))
    }
}

/// Compute the dimensions of the bounding box for a rotated image.
///
/// # Arguments
///
/// * `width` - Original image width
/// * `height` - Original image height
/// * `angle_degrees` - Rotation angle in degrees (positive = clockwise)
///
/// # Returns
///
/// Tuple of (new_width, new_height) for the rotated bounding box.
pub fn compute_rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    let params = TransformParameters::new(angle_degrees, false, false);
    match params.quarter_turns() {
        Some(0) | Some(2) => return (width, height),
        Some(_) => return (height, width),
        None => {}
    }

    let angle_rad = params.rotation_degrees.to_radians();
    let cos = angle_rad.cos().abs();
    let sin = angle_rad.sin().abs();

    let w = width as f64;
    let h = height as f64;

    // new_w = |w*cos| + |h*sin|, new_h = |w*sin| + |h*cos|
    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Apply rotation and mirroring to a buffer.
///
/// The identity parameters return a bit-identical copy. Axis-aligned
/// transforms are lossless; other angles are resampled with `filter` onto a
/// canvas expanded to the rotated bounding box, with uncovered pixels left
/// transparent.
///
/// # Errors
///
/// Returns `GeometryError::EmptySource` for zero-area buffers and
/// `GeometryError::MalformedSource` when the sample count is wrong.
pub fn apply_geometry(
    image: &PixelBuffer,
    params: &TransformParameters,
    filter: InterpolationFilter,
) -> Result<PixelBuffer, GeometryError> {
    validate(image)?;

    if params.is_identity() {
        return Ok(image.clone());
    }

    let linear = Affine::from_parameters(params);
    let (dst_w, dst_h) = compute_rotated_bounds(image.width, image.height, params.rotation_degrees);

    // Source center -> origin -> linear -> destination center
    let forward = Affine::translate(-(image.width as f64) / 2.0, -(image.height as f64) / 2.0)
        .then(linear)
        .then(Affine::translate(dst_w as f64 / 2.0, dst_h as f64 / 2.0));
    let inverse = forward.invert().ok_or(GeometryError::EmptySource {
        width: image.width,
        height: image.height,
    })?;

    let filter = if linear.is_axis_aligned() {
        InterpolationFilter::Nearest
    } else {
        filter
    };

    let bpp = image.format.bytes_per_pixel();
    let mut output = PixelBuffer::transparent(dst_w, dst_h, image.format);
    for (idx, px) in output.samples.chunks_exact_mut(bpp).enumerate() {
        let dst_x = (idx % dst_w as usize) as f64 + 0.5;
        let dst_y = (idx / dst_w as usize) as f64 + 0.5;
        let (src_x, src_y) = inverse.apply(dst_x, dst_y);
        sample(image, src_x, src_y, filter, px);
    }

    Ok(output)
}

fn validate(image: &PixelBuffer) -> Result<(), GeometryError> {
    if image.width == 0 || image.height == 0 || image.samples.is_empty() {
        return Err(GeometryError::EmptySource {
            width: image.width,
            height: image.height,
        });
    }
    let expected = image.pixel_count() * image.format.bytes_per_pixel();
    if image.samples.len() != expected {
        return Err(GeometryError::MalformedSource {
            expected,
            actual: image.samples.len(),
        });
    }
    Ok(())
}

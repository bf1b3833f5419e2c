//! The fixed-order render pipeline.
//!
//! ## Order of Operations
//! 1. Geometry (rotation and mirroring)
//! 2. Aspect (fill-resize and center-crop to the preset canvas)
//! 3. Color (saturation, brightness, then hue)
//! 4. Corner (rounded-rectangle alpha mask)
//!
//! The first failing stage aborts the render and its error is returned with
//! the stage that produced it.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aspect::{resize_to_fill, AspectPreset, CanvasSize, ResizeError, DEFAULT_CANVAS};
use crate::buffer::PixelBuffer;
use crate::color::{adjust_colors, ColorAdjustment, ColorError};
use crate::corner::{apply_corner_mask, CornerRadius, MaskError};
use crate::transform::{apply_geometry, GeometryError, InterpolationFilter, TransformParameters};

/// One of the four pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Geometry,
    Aspect,
    Color,
    Corner,
}

impl Stage {
    /// Stages in render order.
    pub const ORDER: [Stage; 4] = [Stage::Geometry, Stage::Aspect, Stage::Color, Stage::Corner];

    /// Position of this stage in [`Stage::ORDER`].
    pub fn index(self) -> usize {
        match self {
            Stage::Geometry => 0,
            Stage::Aspect => 1,
            Stage::Color => 2,
            Stage::Corner => 3,
        }
    }

    /// Stages that run before this one.
    pub fn upstream(self) -> &'static [Stage] {
        &Self::ORDER[..self.index()]
    }

    /// This stage and every stage after it.
    pub fn downstream(self) -> &'static [Stage] {
        &Self::ORDER[self.index()..]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Geometry => "geometry",
            Stage::Aspect => "aspect",
            Stage::Color => "color",
            Stage::Corner => "corner",
        };
        f.write_str(name)
    }
}

/// A stage failure, tagged with the stage it came from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("geometry stage failed: {0}")]
    Geometry(#[from] GeometryError),

    #[error("aspect stage failed: {0}")]
    Aspect(#[from] ResizeError),

    #[error("color stage failed: {0}")]
    Color(#[from] ColorError),

    #[error("corner stage failed: {0}")]
    Corner(#[from] MaskError),
}

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Geometry(_) => Stage::Geometry,
            PipelineError::Aspect(_) => Stage::Aspect,
            PipelineError::Color(_) => Stage::Color,
            PipelineError::Corner(_) => Stage::Corner,
        }
    }
}

/// The complete parameter set for one render.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EditParameters {
    pub transform: TransformParameters,
    pub aspect: AspectPreset,
    pub color: ColorAdjustment,
    pub corner: CornerRadius,
}

impl EditParameters {
    /// True when every parameter set is at its default.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Rendering knobs that are not user edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Width handed to the aspect preset. `None` uses the geometry output width.
    pub available_width: Option<u32>,
    /// Canvas used by the free aspect preset.
    pub default_canvas: CanvasSize,
    /// Filter for non-axis-aligned rotation and scaling.
    pub filter: InterpolationFilter,
    /// Factor applied to the corner radius before masking.
    pub corner_scale: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            available_width: None,
            default_canvas: DEFAULT_CANVAS,
            filter: InterpolationFilter::Bilinear,
            corner_scale: 1.0,
        }
    }
}

impl RenderOptions {
    /// Options for an on-screen preview at `available_width`.
    pub fn preview(
        available_width: u32,
        default_canvas: CanvasSize,
        filter: InterpolationFilter,
    ) -> Self {
        Self {
            available_width: Some(available_width),
            default_canvas,
            filter,
            corner_scale: 1.0,
        }
    }

    /// Options for the final export, framed on the geometry output width.
    pub fn export(default_canvas: CanvasSize, filter: InterpolationFilter, corner_scale: f32) -> Self {
        Self {
            available_width: None,
            default_canvas,
            filter,
            corner_scale,
        }
    }
}

/// Run a single stage on `input`.
///
/// # Errors
///
/// Returns the stage's error wrapped in `PipelineError`.
pub fn apply_stage(
    stage: Stage,
    input: &PixelBuffer,
    params: &EditParameters,
    options: &RenderOptions,
) -> Result<PixelBuffer, PipelineError> {
    let output = match stage {
        Stage::Geometry => apply_geometry(input, &params.transform, options.filter)?,
        Stage::Aspect => {
            let available = options.available_width.unwrap_or(input.width);
            let target = params
                .aspect
                .size_with_default(available, options.default_canvas);
            resize_to_fill(input, target, options.filter)?
        }
        Stage::Color => adjust_colors(input, &params.color)?,
        Stage::Corner => apply_corner_mask(input, params.corner.scaled(options.corner_scale))?,
    };

    tracing::trace!(
        %stage,
        width = output.width,
        height = output.height,
        "stage rendered"
    );
    Ok(output)
}

/// Run `stages` in sequence, stopping at the first failure.
///
/// # Errors
///
/// Returns the first stage failure.
pub fn render_stages(
    input: &PixelBuffer,
    stages: &[Stage],
    params: &EditParameters,
    options: &RenderOptions,
) -> Result<PixelBuffer, PipelineError> {
    let mut current = Cow::Borrowed(input);
    for &stage in stages {
        current = Cow::Owned(apply_stage(stage, &current, params, options)?);
    }
    Ok(current.into_owned())
}

/// Render `source` through all four stages in the fixed order.
///
/// # Arguments
///
/// * `source` - The original, unedited buffer
/// * `params` - Committed edit parameters
/// * `options` - Filter, framing and scaling options
///
/// # Returns
///
/// The final RGBA buffer, ready for encoding.
///
/// # Errors
///
/// Returns `PipelineError` naming the first stage that failed. No later
/// stage runs after a failure.
pub fn render(
    source: &PixelBuffer,
    params: &EditParameters,
    options: &RenderOptions,
) -> Result<PixelBuffer, PipelineError> {
    let output = render_stages(source, &Stage::ORDER, params, options)?;
    tracing::debug!(
        source_width = source.width,
        source_height = source.height,
        width = output.width,
        height = output.height,
        "render complete"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelFormat;
    use crate::transform::ImageTransformation;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::filled(width, height, [0, 0, 0, 255]);
        for y in 0..height {
            for x in 0..width {
                let idx = buf.offset(x, y);
                buf.samples[idx] = (x * 255 / width.max(1)) as u8;
                buf.samples[idx + 1] = (y * 255 / height.max(1)) as u8;
            }
        }
        buf
    }

    // ===== Stage =====

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Color.upstream(), &[Stage::Geometry, Stage::Aspect]);
        assert_eq!(Stage::Color.downstream(), &[Stage::Color, Stage::Corner]);
        assert!(Stage::Geometry.upstream().is_empty());
        assert_eq!(Stage::Corner.to_string(), "corner");
    }

    // ===== render =====

    #[test]
    fn test_default_parameters_use_default_canvas() {
        let src = gradient(100, 80);
        let out = render(&src, &EditParameters::default(), &RenderOptions::default()).unwrap();
        assert_eq!((out.width, out.height), (358, 412));
        assert!(out.is_opaque());
    }

    #[test]
    fn test_one_to_one_preview_scenario() {
        let src = gradient(1000, 2000);
        let params = EditParameters {
            aspect: AspectPreset::OneToOne,
            ..Default::default()
        };
        let options = RenderOptions::preview(358, DEFAULT_CANVAS, InterpolationFilter::Bilinear);
        let out = render(&src, &params, &options).unwrap();
        assert_eq!((out.width, out.height), (358, 358));
    }

    #[test]
    fn test_geometry_runs_before_aspect() {
        // 200x100 rotated to 100x200; export framing sizes 16:9 from width 100
        let src = gradient(200, 100);
        let params = EditParameters {
            transform: TransformParameters::default().apply(ImageTransformation::RotateClockwise),
            aspect: AspectPreset::SixteenToNine,
            ..Default::default()
        };
        let out = render(&src, &params, &RenderOptions::default()).unwrap();
        assert_eq!((out.width, out.height), (100, 56));
    }

    #[test]
    fn test_corners_applied_last_and_scaled() {
        let src = PixelBuffer::filled(64, 64, [255, 255, 255, 255]);
        let params = EditParameters {
            aspect: AspectPreset::OneToOne,
            color: ColorAdjustment::new(0.0, 1.0, -1.0),
            corner: CornerRadius::new(4.0, 100.0),
            ..Default::default()
        };
        let options = RenderOptions::export(DEFAULT_CANVAS, InterpolationFilter::Lanczos3, 4.0);
        let out = render(&src, &params, &options).unwrap();

        assert_eq!((out.width, out.height), (64, 64));
        assert_eq!(out.pixel(32, 32), &[0, 0, 0, 255]);
        assert_eq!(out.pixel(0, 0)[3], 0);
        // Radius 16 after scaling: (3, 3) is well outside the arc
        assert_eq!(out.pixel(3, 3)[3], 0);
    }

    #[test]
    fn test_first_failure_aborts_with_stage() {
        let mask = PixelBuffer::transparent(10, 10, PixelFormat::Alpha8);
        let err = render(&mask, &EditParameters::default(), &RenderOptions::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Aspect);
        assert!(err.to_string().starts_with("aspect stage failed"));

        let empty = PixelBuffer::transparent(0, 0, PixelFormat::Rgba8);
        let err = render(&empty, &EditParameters::default(), &RenderOptions::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Geometry);
    }

    #[test]
    fn test_zero_available_width_is_degenerate() {
        let src = gradient(10, 10);
        let params = EditParameters {
            aspect: AspectPreset::FourToThree,
            ..Default::default()
        };
        let options = RenderOptions::preview(0, DEFAULT_CANVAS, InterpolationFilter::Bilinear);
        let err = render(&src, &params, &options).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Aspect(ResizeError::DegenerateTarget {
                width: 0,
                height: 0
            })
        );
    }

    #[test]
    fn test_render_stages_matches_render() {
        let src = gradient(120, 90);
        let params = EditParameters {
            transform: TransformParameters::new(90.0, true, false),
            aspect: AspectPreset::ThreeToTwo,
            color: ColorAdjustment::new(30.0, 1.2, 0.1),
            corner: CornerRadius::new(8.0, 100.0),
        };
        let options = RenderOptions::default();

        let full = render(&src, &params, &options).unwrap();
        let prefix = render_stages(&src, Stage::Color.upstream(), &params, &options).unwrap();
        let rest = render_stages(&prefix, Stage::Color.downstream(), &params, &options).unwrap();
        assert_eq!(full, rest);
    }
}

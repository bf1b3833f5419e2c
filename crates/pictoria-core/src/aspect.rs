//! Aspect-ratio presets and fill-resizing.
//!
//! A preset turns the width available to the canvas into target canvas
//! dimensions. The buffer is then scaled to *fill* that canvas (never
//! letterboxed) and center-cropped to the exact target size.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{PixelBuffer, PixelFormat};
use crate::transform::InterpolationFilter;

/// Canvas size used by [`AspectPreset::None`], independent of available width.
pub const DEFAULT_CANVAS: CanvasSize = CanvasSize {
    width: 358,
    height: 412,
};

/// Errors produced by the aspect stage.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResizeError {
    /// The derived target canvas has zero width or height.
    #[error("Degenerate target size: {width}x{height}")]
    DegenerateTarget { width: u32, height: u32 },

    /// The source buffer has zero area.
    #[error("Source buffer is empty ({width}x{height})")]
    EmptySource { width: u32, height: u32 },

    /// Only RGBA buffers can be resized.
    #[error("Unsupported pixel format for resizing: {0:?}")]
    UnsupportedFormat(PixelFormat),
}

/// Width and height of a canvas in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        DEFAULT_CANVAS
    }
}

/// Named width:height ratios offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectPreset {
    OneToOne,
    ThreeToFour,
    FourToThree,
    SixteenToNine,
    NineToSixteen,
    TwoToThree,
    ThreeToTwo,
    /// Free size: a fixed default canvas.
    #[default]
    None,
}

impl AspectPreset {
    /// All presets in display order.
    pub const ALL: [AspectPreset; 8] = [
        AspectPreset::OneToOne,
        AspectPreset::ThreeToFour,
        AspectPreset::FourToThree,
        AspectPreset::SixteenToNine,
        AspectPreset::NineToSixteen,
        AspectPreset::TwoToThree,
        AspectPreset::ThreeToTwo,
        AspectPreset::None,
    ];

    /// The `(width, height)` ratio, or `None` for the free preset.
    pub fn ratio(self) -> Option<(u32, u32)> {
        match self {
            AspectPreset::OneToOne => Some((1, 1)),
            AspectPreset::ThreeToFour => Some((3, 4)),
            AspectPreset::FourToThree => Some((4, 3)),
            AspectPreset::SixteenToNine => Some((16, 9)),
            AspectPreset::NineToSixteen => Some((9, 16)),
            AspectPreset::TwoToThree => Some((2, 3)),
            AspectPreset::ThreeToTwo => Some((3, 2)),
            AspectPreset::None => None,
        }
    }

    /// Human-readable label, e.g. `"16:9"`.
    pub fn label(self) -> &'static str {
        match self {
            AspectPreset::OneToOne => "1:1",
            AspectPreset::ThreeToFour => "3:4",
            AspectPreset::FourToThree => "4:3",
            AspectPreset::SixteenToNine => "16:9",
            AspectPreset::NineToSixteen => "9:16",
            AspectPreset::TwoToThree => "2:3",
            AspectPreset::ThreeToTwo => "3:2",
            AspectPreset::None => "none",
        }
    }

    /// Target canvas for the given available width.
    ///
    /// Ratio presets return `(available_width, available_width * h / w)`;
    /// the free preset returns [`DEFAULT_CANVAS`].
    pub fn size(self, available_width: u32) -> CanvasSize {
        self.size_with_default(available_width, DEFAULT_CANVAS)
    }

    /// Like [`size`](Self::size), with a caller-supplied canvas for the free preset.
    pub fn size_with_default(self, available_width: u32, default: CanvasSize) -> CanvasSize {
        match self.ratio() {
            Some((rw, rh)) => CanvasSize {
                width: available_width,
                height: (available_width as f64 * rh as f64 / rw as f64).round() as u32,
            },
            None => default,
        }
    }
}

/// Resize `image` to the canvas derived from `preset` and `available_width`.
///
/// # Errors
///
/// Returns `ResizeError::DegenerateTarget` if the derived canvas has zero
/// width or height.
pub fn resize_to_preset(
    image: &PixelBuffer,
    preset: AspectPreset,
    available_width: u32,
    filter: InterpolationFilter,
) -> Result<PixelBuffer, ResizeError> {
    resize_to_fill(image, preset.size(available_width), filter)
}

/// Scale `image` to cover `target` and center-crop to exactly `target`.
///
/// Content outside the target rectangle is discarded.
pub fn resize_to_fill(
    image: &PixelBuffer,
    target: CanvasSize,
    filter: InterpolationFilter,
) -> Result<PixelBuffer, ResizeError> {
    if target.width == 0 || target.height == 0 {
        return Err(ResizeError::DegenerateTarget {
            width: target.width,
            height: target.height,
        });
    }
    if image.is_empty() {
        return Err(ResizeError::EmptySource {
            width: image.width,
            height: image.height,
        });
    }
    if image.format != PixelFormat::Rgba8 {
        return Err(ResizeError::UnsupportedFormat(image.format));
    }

    // Fast path: if dimensions match, just clone
    if image.width == target.width && image.height == target.height {
        return Ok(image.clone());
    }

    let rgba = image.to_rgba_image().ok_or(ResizeError::EmptySource {
        width: image.width,
        height: image.height,
    })?;

    // Crop in source space first so only the visible region is scaled
    let crop = fill_crop(image.width, image.height, target);
    let region = if (crop.width, crop.height) == (image.width, image.height) {
        rgba
    } else {
        image::imageops::crop_imm(&rgba, crop.left, crop.top, crop.width, crop.height).to_image()
    };

    if (region.width(), region.height()) == (target.width, target.height) {
        return Ok(PixelBuffer::from_rgba_image(region));
    }
    let scaled = image::imageops::resize(
        &region,
        target.width,
        target.height,
        filter.to_image_filter(),
    );
    Ok(PixelBuffer::from_rgba_image(scaled))
}

/// Source rectangle that aspect-fills a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CropRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

/// The centered source region that, scaled to cover `target`, fills it
/// exactly. Both sides are at least one pixel and fit inside the source.
fn fill_crop(width: u32, height: u32, target: CanvasSize) -> CropRect {
    let scale_x = target.width as f64 / width as f64;
    let scale_y = target.height as f64 / height as f64;
    let scale = scale_x.max(scale_y);

    let crop_w = ((target.width as f64 / scale).round() as u32).clamp(1, width);
    let crop_h = ((target.height as f64 / scale).round() as u32).clamp(1, height);
    CropRect {
        left: (width - crop_w) / 2,
        top: (height - crop_h) / 2,
        width: crop_w,
        height: crop_h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Left half red, right half blue.
    fn split_image(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::filled(width, height, [255, 0, 0, 255]);
        for y in 0..height {
            for x in width / 2..width {
                let idx = buf.offset(x, y);
                buf.samples[idx..idx + 4].copy_from_slice(&[0, 0, 255, 255]);
            }
        }
        buf
    }

    #[test]
    fn test_preset_sizes() {
        assert_eq!(
            AspectPreset::OneToOne.size(358),
            CanvasSize {
                width: 358,
                height: 358
            }
        );
        assert_eq!(AspectPreset::ThreeToFour.size(300).height, 400);
        assert_eq!(AspectPreset::FourToThree.size(400).height, 300);
        assert_eq!(AspectPreset::SixteenToNine.size(1600).height, 900);
        assert_eq!(AspectPreset::NineToSixteen.size(90).height, 160);
        assert_eq!(AspectPreset::TwoToThree.size(200).height, 300);
        assert_eq!(AspectPreset::ThreeToTwo.size(300).height, 200);
    }

    #[test]
    fn test_none_preset_ignores_width() {
        assert_eq!(AspectPreset::None.size(10), DEFAULT_CANVAS);
        assert_eq!(AspectPreset::None.size(5000), DEFAULT_CANVAS);
        let custom = CanvasSize {
            width: 64,
            height: 48,
        };
        assert_eq!(AspectPreset::None.size_with_default(999, custom), custom);
    }

    #[test]
    fn test_labels_unique() {
        let mut labels: Vec<_> = AspectPreset::ALL.iter().map(|p| p.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), AspectPreset::ALL.len());
    }

    #[test]
    fn test_tall_source_to_square() {
        let img = PixelBuffer::filled(1000, 2000, [10, 20, 30, 255]);
        let result = resize_to_preset(
            &img,
            AspectPreset::OneToOne,
            358,
            InterpolationFilter::Bilinear,
        )
        .unwrap();
        assert_eq!((result.width, result.height), (358, 358));
    }

    #[test]
    fn test_fill_crops_sides_of_wide_source() {
        // 4:1 red|blue into a square keeps only the middle: left red, right blue
        let img = split_image(400, 100);
        let result = resize_to_fill(
            &img,
            CanvasSize {
                width: 50,
                height: 50,
            },
            InterpolationFilter::Nearest,
        )
        .unwrap();
        assert_eq!((result.width, result.height), (50, 50));
        assert!(result.is_opaque());
        assert_eq!(result.pixel(0, 25), &[255, 0, 0, 255]);
        assert_eq!(result.pixel(49, 25), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_same_size_is_clone() {
        let img = split_image(20, 10);
        let result = resize_to_fill(
            &img,
            CanvasSize {
                width: 20,
                height: 10,
            },
            InterpolationFilter::Lanczos3,
        )
        .unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_degenerate_target() {
        let img = split_image(20, 10);
        let err = resize_to_preset(&img, AspectPreset::SixteenToNine, 0, InterpolationFilter::Bilinear);
        assert_eq!(
            err,
            Err(ResizeError::DegenerateTarget {
                width: 0,
                height: 0
            })
        );
    }

    #[test]
    fn test_one_pixel_width_rounds_up() {
        // 1 * 9 / 16 = 0.5625 rounds to 1
        assert_eq!(
            AspectPreset::SixteenToNine.size(1),
            CanvasSize {
                width: 1,
                height: 1
            }
        );
        let img = split_image(20, 10);
        let result =
            resize_to_preset(&img, AspectPreset::SixteenToNine, 1, InterpolationFilter::Bilinear)
                .unwrap();
        assert_eq!((result.width, result.height), (1, 1));
    }

    #[test]
    fn test_empty_source() {
        let img = PixelBuffer::transparent(0, 0, PixelFormat::Rgba8);
        let err = resize_to_preset(&img, AspectPreset::OneToOne, 10, InterpolationFilter::Bilinear);
        assert!(matches!(err, Err(ResizeError::EmptySource { .. })));
    }

    #[test]
    fn test_alpha_buffer_rejected() {
        let img = PixelBuffer::transparent(4, 4, PixelFormat::Alpha8);
        let err = resize_to_preset(&img, AspectPreset::OneToOne, 10, InterpolationFilter::Bilinear);
        assert_eq!(err, Err(ResizeError::UnsupportedFormat(PixelFormat::Alpha8)));
    }

    #[test]
    fn test_fill_crop_in_source_space() {
        let target = CanvasSize {
            width: 358,
            height: 358,
        };
        assert_eq!(
            fill_crop(1000, 2000, target),
            CropRect {
                left: 0,
                top: 500,
                width: 1000,
                height: 1000
            }
        );
        assert_eq!(
            fill_crop(2000, 1000, target),
            CropRect {
                left: 500,
                top: 0,
                width: 1000,
                height: 1000
            }
        );
    }

    #[test]
    fn test_elongated_source_scales_only_visible_region() {
        // A 1x4000 strip covers 358x358 at scale 358; only its middle pixel is visible
        let mut img = PixelBuffer::filled(1, 4000, [0, 0, 0, 255]);
        let idx = img.offset(0, 1999);
        img.samples[idx..idx + 4].copy_from_slice(&[200, 100, 50, 255]);

        assert_eq!(
            fill_crop(1, 4000, CanvasSize { width: 358, height: 358 }),
            CropRect {
                left: 0,
                top: 1999,
                width: 1,
                height: 1
            }
        );
        let result = resize_to_fill(
            &img,
            CanvasSize {
                width: 358,
                height: 358,
            },
            InterpolationFilter::Nearest,
        )
        .unwrap();
        assert_eq!((result.width, result.height), (358, 358));
        assert_eq!(result.pixel(0, 0), &[200, 100, 50, 255]);
        assert_eq!(result.pixel(357, 357), &[200, 100, 50, 255]);
    }

    proptest! {
        #[test]
        fn prop_one_to_one_is_square(w in 1u32..100_000) {
            let size = AspectPreset::OneToOne.size(w);
            prop_assert_eq!((size.width, size.height), (w, w));
        }

        #[test]
        fn prop_resize_hits_exact_target(
            sw in 1u32..64, sh in 1u32..64, tw in 1u32..64, th in 1u32..64
        ) {
            let img = PixelBuffer::filled(sw, sh, [1, 2, 3, 255]);
            let target = CanvasSize { width: tw, height: th };
            let result = resize_to_fill(&img, target, InterpolationFilter::Bilinear).unwrap();
            prop_assert_eq!((result.width, result.height), (tw, th));
        }
    }
}

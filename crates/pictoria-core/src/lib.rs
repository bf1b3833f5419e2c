//! Pictoria Core - Image transformation pipeline
//!
//! This crate provides the pixel-level half of Pictoria: rotation and
//! mirroring, aspect-ratio fill-resizing, hue/saturation/brightness
//! adjustment and rounded-corner masking, composed in a fixed order by
//! [`pipeline::render`], plus decoding of sources and encoding of results.
//!
//! Every operation is synchronous and takes its input buffer by reference,
//! returning a freshly allocated buffer.

pub mod aspect;
pub mod buffer;
pub mod color;
pub mod corner;
pub mod decode;
pub mod encode;
pub mod pipeline;
pub mod transform;

pub use aspect::{AspectPreset, CanvasSize, ResizeError, DEFAULT_CANVAS};
pub use buffer::{BufferError, PixelBuffer, PixelFormat};
pub use color::{ColorAdjustment, ColorError};
pub use corner::{CornerRadius, MaskError};
pub use decode::{decode_image, DecodeError, Orientation, SourceImage};
pub use encode::{encode, EncodeError, EncodeFormat};
pub use pipeline::{render, EditParameters, PipelineError, RenderOptions, Stage};
pub use transform::{
    apply_geometry, compute_rotated_bounds, GeometryError, ImageTransformation,
    InterpolationFilter, TransformParameters,
};

//! Geometric transforms: rotation and mirroring.
//!
//! Geometry is the first stage of the pipeline; it runs before aspect
//! sizing, color adjustment and corner masking.
//!
//! # Coordinate System
//!
//! - Origin is the top-left corner, y points down
//! - Rotation angles are in degrees, positive = clockwise on screen
//! - Mirroring is applied before rotation

mod geometry;
mod sampling;

pub use geometry::{
    apply_geometry, compute_rotated_bounds, Affine, GeometryError, ImageTransformation,
    TransformParameters,
};
pub use sampling::InterpolationFilter;

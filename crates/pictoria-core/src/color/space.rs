//! Color-space helpers: BT.709 luma and YIQ hue rotation.
//!
//! Luma drives the saturation control. Hue rotation happens in YIQ, where
//! rotating the (I, Q) chroma plane around the Y axis shifts hue while
//! leaving luma and chroma magnitude untouched.

/// ITU-R BT.709 coefficient for red channel in luminance calculation.
pub const LUMINANCE_R: f32 = 0.2126;

/// ITU-R BT.709 coefficient for green channel in luminance calculation.
pub const LUMINANCE_G: f32 = 0.7152;

/// ITU-R BT.709 coefficient for blue channel in luminance calculation.
pub const LUMINANCE_B: f32 = 0.0722;

/// RGB -> YIQ (NTSC).
const RGB_TO_YIQ: [[f32; 3]; 3] = [
    [0.299, 0.587, 0.114],
    [0.595_716, -0.274_453, -0.321_263],
    [0.211_456, -0.522_591, 0.311_135],
];

/// YIQ -> RGB (NTSC).
const YIQ_TO_RGB: [[f32; 3]; 3] = [
    [1.0, 0.956_3, 0.621_0],
    [1.0, -0.272_1, -0.647_4],
    [1.0, -1.107_0, 1.704_6],
];

/// Calculate luminance from normalized RGB values (0.0 to 1.0).
#[inline]
pub fn calculate_luminance(r: f32, g: f32, b: f32) -> f32 {
    LUMINANCE_R * r + LUMINANCE_G * g + LUMINANCE_B * b
}

/// A 3×3 color matrix applied to column vectors `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix(pub [[f32; 3]; 3]);

impl ColorMatrix {
    /// Matrix that rotates hue by `degrees` in YIQ space.
    pub fn hue_rotation(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let rotate = [[1.0, 0.0, 0.0], [0.0, cos, -sin], [0.0, sin, cos]];
        ColorMatrix(multiply(&YIQ_TO_RGB, &multiply(&rotate, &RGB_TO_YIQ)))
    }

    #[inline]
    pub fn apply(&self, r: f32, g: f32, b: f32) -> (f32, f32, f32) {
        let m = &self.0;
        (
            m[0][0] * r + m[0][1] * g + m[0][2] * b,
            m[1][0] * r + m[1][1] * g + m[1][2] * b,
            m[2][0] * r + m[2][1] * g + m[2][2] * b,
        )
    }
}

/// Convert normalized RGB to YIQ.
#[inline]
pub fn rgb_to_yiq(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    ColorMatrix(RGB_TO_YIQ).apply(r, g, b)
}

fn multiply(lhs: &[[f32; 3]; 3], rhs: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| lhs[i][k] * rhs[k][j]).sum();
        }
    }
    out
}

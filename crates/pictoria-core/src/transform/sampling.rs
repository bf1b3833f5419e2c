//! Pixel sampling with nearest, bilinear and Lanczos3 interpolation.
//!
//! Coordinates are continuous: pixel `i` covers `[i, i + 1)`, so its center
//! sits at `i + 0.5`. Samples that fall outside the source canvas come back
//! fully transparent. RGBA samples are interpolated premultiplied so that
//! transparent neighbors don't bleed their color into the result.

use serde::{Deserialize, Serialize};

use crate::buffer::{PixelBuffer, PixelFormat};

/// Interpolation filter for resampling operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationFilter {
    /// Nearest neighbor (exact for axis-aligned transforms).
    Nearest,
    /// Fast bilinear interpolation - good for preview rendering.
    #[default]
    Bilinear,
    /// High-quality Lanczos3 interpolation - good for export.
    Lanczos3,
}

impl InterpolationFilter {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            InterpolationFilter::Nearest => image::imageops::FilterType::Nearest,
            InterpolationFilter::Bilinear => image::imageops::FilterType::Triangle,
            InterpolationFilter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Sample `image` at continuous coordinates `(x, y)` into `out`.
///
/// `out` must hold exactly `image.format.bytes_per_pixel()` bytes.
pub(crate) fn sample(
    image: &PixelBuffer,
    x: f64,
    y: f64,
    filter: InterpolationFilter,
    out: &mut [u8],
) {
    let (w, h) = (image.width as f64, image.height as f64);
    if x < 0.0 || y < 0.0 || x >= w || y >= h {
        out.fill(0);
        return;
    }

    match filter {
        InterpolationFilter::Nearest => {
            let src = image.pixel(x as u32, y as u32);
            out.copy_from_slice(src);
        }
        InterpolationFilter::Bilinear => sample_bilinear(image, x - 0.5, y - 0.5, out),
        InterpolationFilter::Lanczos3 => sample_lanczos3(image, x - 0.5, y - 0.5, out),
    }
}

/// Weighted accumulator over up to four channels.
struct Accumulator {
    sum: [f64; 4],
    weight: f64,
    premultiplied: bool,
    channels: usize,
}

impl Accumulator {
    fn new(format: PixelFormat) -> Self {
        Self {
            sum: [0.0; 4],
            weight: 0.0,
            premultiplied: format == PixelFormat::Rgba8,
            channels: format.bytes_per_pixel(),
        }
    }

    #[inline]
    fn add(&mut self, px: &[u8], weight: f64) {
        if self.premultiplied {
            let alpha = px[3] as f64;
            for c in 0..3 {
                self.sum[c] += px[c] as f64 * alpha * weight;
            }
            self.sum[3] += alpha * weight;
        } else {
            for c in 0..self.channels {
                self.sum[c] += px[c] as f64 * weight;
            }
        }
        self.weight += weight;
    }

    fn finish(&self, out: &mut [u8]) {
        if self.weight.abs() < f64::EPSILON {
            out.fill(0);
            return;
        }
        if self.premultiplied {
            let alpha = self.sum[3] / self.weight;
            if alpha <= 0.0 {
                out.fill(0);
                return;
            }
            for c in 0..3 {
                out[c] = (self.sum[c] / self.sum[3]).clamp(0.0, 255.0).round() as u8;
            }
            out[3] = alpha.clamp(0.0, 255.0).round() as u8;
        } else {
            for c in 0..self.channels {
                out[c] = (self.sum[c] / self.weight).clamp(0.0, 255.0).round() as u8;
            }
        }
    }
}

/// Bilinear interpolation over the 4 nearest pixel centers, clamped to edges.
fn sample_bilinear(image: &PixelBuffer, u: f64, v: f64, out: &mut [u8]) {
    let max_x = image.width as i64 - 1;
    let max_y = image.height as i64 - 1;

    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let clamp_x = |x: i64| x.clamp(0, max_x) as u32;
    let clamp_y = |y: i64| y.clamp(0, max_y) as u32;

    let mut acc = Accumulator::new(image.format);
    acc.add(image.pixel(clamp_x(x0), clamp_y(y0)), (1.0 - fx) * (1.0 - fy));
    acc.add(image.pixel(clamp_x(x0 + 1), clamp_y(y0)), fx * (1.0 - fy));
    acc.add(image.pixel(clamp_x(x0), clamp_y(y0 + 1)), (1.0 - fx) * fy);
    acc.add(image.pixel(clamp_x(x0 + 1), clamp_y(y0 + 1)), fx * fy);
    acc.finish(out);
}

/// Lanczos3 interpolation over a 6x6 neighborhood.
///
/// Falls back to bilinear near the edges where the kernel would leave the
/// canvas.
fn sample_lanczos3(image: &PixelBuffer, u: f64, v: f64, out: &mut [u8]) {
    let (w, h) = (image.width as i64, image.height as i64);

    if u < 2.0 || u >= (w - 3) as f64 || v < 2.0 || v >= (h - 3) as f64 {
        sample_bilinear(image, u, v, out);
        return;
    }

    let x0 = u.floor() as i64;
    let y0 = v.floor() as i64;

    let mut acc = Accumulator::new(image.format);
    for ky in -2..=3 {
        for kx in -2..=3 {
            let px = x0 + kx;
            let py = y0 + ky;
            let weight = lanczos_weight(u - px as f64, 3.0) * lanczos_weight(v - py as f64, 3.0);
            acc.add(image.pixel(px as u32, py as u32), weight);
        }
    }
    acc.finish(out);
}

/// Lanczos kernel weight function.
///
/// ```text
/// L(x) = sinc(x) * sinc(x/a)  for |x| < a
/// L(x) = 0                     for |x| >= a
/// ```
fn lanczos_weight(x: f64, a: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }

    let pi_x = std::f64::consts::PI * x;
    let pi_x_a = pi_x / a;
    (a * pi_x.sin() * pi_x_a.sin()) / (pi_x * pi_x)
}

//! True-color compositing of three reflectance channels.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{RenderError, RenderResult};

/// Pixel-interleaved (red, green, blue) image aligned 1:1 with the source grid.
///
/// Values are normalized reflectance; no-data pixels are NaN in every band.
#[derive(Debug, Clone)]
pub struct RgbImage {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl RgbImage {
    /// Band values at (row, col), or `None` for a no-data pixel.
    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> Option<[f32; 3]> {
        let i = (row * self.cols + col) * 3;
        let px = [self.data[i], self.data[i + 1], self.data[i + 2]];
        if px.iter().any(|v| v.is_nan()) {
            None
        } else {
            Some(px)
        }
    }

    /// Opaque 8-bit color for a pixel; values outside [0, 1] saturate.
    #[inline]
    pub fn rgba8(&self, row: usize, col: usize) -> Option<[u8; 4]> {
        let [r, g, b] = self.pixel(row, col)?;
        Some([to_u8(r), to_u8(g), to_u8(b), 255])
    }

    /// Values of one band (0 = red, 1 = green, 2 = blue).
    pub fn band(&self, band: usize) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().skip(band).step_by(3).copied()
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Build a true-color image from blue, red and green channels.
///
/// Masked pixels become NaN before normalization, then each band is divided
/// by its own maximum finite value. A band whose maximum is not positive is
/// left unscaled.
pub fn compose(
    shape: (usize, usize),
    blue: &[f32],
    red: &[f32],
    green: &[f32],
    no_data: &[bool],
) -> RenderResult<RgbImage> {
    let (rows, cols) = shape;
    let expected = rows * cols;
    for (band, len) in [
        ("blue", blue.len()),
        ("red", red.len()),
        ("green", green.len()),
        ("no-data mask", no_data.len()),
    ] {
        if len != expected {
            return Err(RenderError::ShapeMismatch {
                band,
                expected,
                actual: len,
            });
        }
    }

    let ((red, green), blue) = rayon::join(
        || {
            rayon::join(
                || normalize_band("red", red, no_data),
                || normalize_band("green", green, no_data),
            )
        },
        || normalize_band("blue", blue, no_data),
    );
    let (red, green, blue) = (red?, green?, blue?);

    let mut data = vec![0.0f32; expected * 3];
    data.par_chunks_mut(3)
        .zip(red.par_iter().zip(green.par_iter().zip(blue.par_iter())))
        .for_each(|(px, (&r, (&g, &b)))| {
            px[0] = r;
            px[1] = g;
            px[2] = b;
        });

    Ok(RgbImage { rows, cols, data })
}

fn normalize_band(name: &'static str, values: &[f32], no_data: &[bool]) -> RenderResult<Vec<f32>> {
    let masked: Vec<f32> = values
        .par_iter()
        .zip(no_data.par_iter())
        .map(|(&v, &nd)| if nd { f32::NAN } else { v })
        .collect();

    let max = masked
        .par_iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce_with(f32::max)
        .ok_or(RenderError::EmptyBand(name))?;

    debug!(band = name, max, "Normalizing band");

    if max <= 0.0 {
        return Ok(masked);
    }
    Ok(masked.into_par_iter().map(|v| v / max).collect())
}

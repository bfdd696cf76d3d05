//! Mean squared error on the 8-bit sample scale.

use crate::types::RgbImage;

/// Largest possible MSE between two 8-bit rasters (`255²`).
pub const MAX_MSE: f64 = 65_025.0;

/// Mean of squared per-sample differences over every channel of every
/// pixel, on the `[0, 255]` scale.
///
/// The squared differences are summed as integers, so the result is
/// exact up to the final division and independent of summation order.
/// Both rasters must share a shape; callers get that guarantee from
/// [`RasterPair`](crate::normalize::RasterPair).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_squared_error(a: &RgbImage, b: &RgbImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions(), "raster shapes differ");

    let samples = a.as_raw().len().min(b.as_raw().len());
    if samples == 0 {
        return 0.0;
    }

    let sum: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| {
            let d = u64::from(x.abs_diff(y));
            d * d
        })
        .sum();

    sum as f64 / samples as f64
}

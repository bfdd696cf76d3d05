//! Plain luminance grid used by SSIM and the histogram comparator.

use crate::types::RgbImage;

/// ITU-R BT.601 luma weights for R, G and B.
pub const BT601_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Row-major grid of luminance samples on the `[0, 255]` scale.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaGrid {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl LumaGrid {
    /// Wrap row-major samples. Returns `None` if `data.len()` is not
    /// `width * height`.
    #[must_use]
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Option<Self> {
        (width.checked_mul(height) == Some(data.len())).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Grid filled with one value.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// BT.601 luminance of an RGB raster.
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let [wr, wg, wb] = BT601_WEIGHTS;
        let data = image
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                wb.mul_add(
                    f64::from(b),
                    wr.mul_add(f64::from(r), wg * f64::from(g)),
                )
            })
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    /// Width in samples.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in samples.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// All samples, row-major.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.data
    }

    /// `true` if both grids have the same width and height.
    #[must_use]
    pub const fn same_shape(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_length() {
        assert!(LumaGrid::new(2, 3, vec![0.0; 6]).is_some());
        assert!(LumaGrid::new(2, 3, vec![0.0; 5]).is_none());
    }

    #[test]
    fn green_is_brightest_primary() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => image::Rgb([255, 0, 0]),
            1 => image::Rgb([0, 255, 0]),
            _ => image::Rgb([0, 0, 255]),
        });
        let grid = LumaGrid::from_rgb(&img);
        let s = grid.samples();
        assert!(s[1] > s[0] && s[0] > s[2], "got {s:?}");
    }

    #[test]
    fn white_maps_to_full_scale() {
        let grid = LumaGrid::from_rgb(&RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255])));
        assert!((grid.samples()[0] - 255.0).abs() < 1e-9);
    }
}

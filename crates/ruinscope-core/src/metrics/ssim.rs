//! Structural similarity (SSIM) over luminance grids.
//!
//! Standard Wang et al. formulation. For every window position the
//! local means, variances and covariance are taken with the window's
//! weights, combined as
//!
//! ```text
//!         (2·μa·μb + C1) · (2·σab + C2)
//! SSIM = ───────────────────────────────────
//!        (μa² + μb² + C1) · (σa² + σb² + C2)
//! ```
//!
//! with `C1 = (K1·L)²`, `C2 = (K2·L)²` and `L = 255`, and the result is
//! the mean over all "valid" positions (window fully inside the image,
//! stride 1). Weighted moments are computed with a separable filter,
//! so the cost is `O(pixels × window_size)`.
//!
//! An image smaller than the window along either axis is scored with
//! whole-image statistics instead.

use serde::{Deserialize, Serialize};

use super::luma::LumaGrid;
use crate::types::AnalysisError;

/// First stabilizing coefficient.
pub const K1: f64 = 0.01;
/// Second stabilizing coefficient.
pub const K2: f64 = 0.03;
/// Sample range of the luminance grids.
pub const DYNAMIC_RANGE: f64 = 255.0;
/// Luminance stabilizer `(K1·L)²`.
pub const C1: f64 = (K1 * DYNAMIC_RANGE) * (K1 * DYNAMIC_RANGE);
/// Contrast/structure stabilizer `(K2·L)²`.
pub const C2: f64 = (K2 * DYNAMIC_RANGE) * (K2 * DYNAMIC_RANGE);

/// Largest accepted window side.
pub const MAX_WINDOW_SIZE: usize = 64;

/// Local window used for SSIM statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SsimWindow {
    /// Square Gaussian-weighted window.
    Gaussian {
        /// Side length in pixels.
        size: usize,
        /// Standard deviation of the weights in pixels.
        sigma: f64,
    },
    /// Square window with equal weights.
    Uniform {
        /// Side length in pixels.
        size: usize,
    },
}

impl Default for SsimWindow {
    fn default() -> Self {
        Self::Gaussian {
            size: Self::DEFAULT_GAUSSIAN_SIZE,
            sigma: Self::DEFAULT_GAUSSIAN_SIGMA,
        }
    }
}

impl SsimWindow {
    /// Side of the default Gaussian window.
    pub const DEFAULT_GAUSSIAN_SIZE: usize = 11;
    /// Sigma of the default Gaussian window.
    pub const DEFAULT_GAUSSIAN_SIGMA: f64 = 1.5;
    /// Side of the default uniform window.
    pub const DEFAULT_UNIFORM_SIZE: usize = 8;

    /// Side length in pixels.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Gaussian { size, .. } | Self::Uniform { size } => size,
        }
    }

    /// Check the window parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] for a zero or oversized
    /// window, or a non-positive/non-finite Gaussian sigma.
    pub fn validate(self) -> Result<(), AnalysisError> {
        let size = self.size();
        if size == 0 || size > MAX_WINDOW_SIZE {
            return Err(AnalysisError::InvalidConfig(format!(
                "SSIM window size must be in 1..={MAX_WINDOW_SIZE}, got {size}"
            )));
        }
        if let Self::Gaussian { sigma, .. } = self
            && !(sigma.is_finite() && sigma > 0.0)
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "SSIM Gaussian sigma must be positive and finite, got {sigma}"
            )));
        }
        Ok(())
    }

    /// One-dimensional weights, normalized to sum to 1.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn weights(self) -> Vec<f64> {
        let raw: Vec<f64> = match self {
            Self::Uniform { size } => vec![1.0; size],
            Self::Gaussian { size, sigma } => {
                let center = (size as f64 - 1.0) / 2.0;
                let denom = 2.0 * sigma * sigma;
                (0..size)
                    .map(|i| {
                        let d = i as f64 - center;
                        (-(d * d) / denom).exp()
                    })
                    .collect()
            }
        };
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }
}

/// SSIM from one window's statistics.
#[must_use]
pub fn local_ssim(mean_a: f64, mean_b: f64, var_a: f64, var_b: f64, covariance: f64) -> f64 {
    let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * covariance + C2);
    let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);
    numerator / denominator
}

/// Mean SSIM between two equally shaped luminance grids, in `[-1, 1]`.
///
/// # Errors
///
/// Returns [`AnalysisError::Internal`] if the grids differ in shape or
/// are empty.
pub fn ssim(a: &LumaGrid, b: &LumaGrid, window: SsimWindow) -> Result<f64, AnalysisError> {
    if !a.same_shape(b) {
        return Err(AnalysisError::Internal(format!(
            "SSIM grids differ: {}x{} vs {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height(),
        )));
    }
    if a.samples().is_empty() {
        return Err(AnalysisError::Internal("SSIM on an empty grid".to_string()));
    }

    let size = window.size();
    let value = if a.width() < size || a.height() < size {
        tracing::trace!(
            width = a.width(),
            height = a.height(),
            size,
            "image smaller than SSIM window, using whole-image statistics",
        );
        global_ssim(a.samples(), b.samples())
    } else {
        windowed_ssim(a, b, &window.weights())
    };
    Ok(value.clamp(-1.0, 1.0))
}

/// SSIM with a single window covering every sample equally.
#[allow(clippy::cast_precision_loss)]
fn global_ssim(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut var_a, mut var_b, mut cov) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        var_a += da * da;
        var_b += db * db;
        cov += da * db;
    }

    local_ssim(mean_a, mean_b, var_a / n, var_b / n, cov / n)
}

#[allow(clippy::cast_precision_loss)]
fn windowed_ssim(a: &LumaGrid, b: &LumaGrid, weights: &[f64]) -> f64 {
    let (w, h) = (a.width(), a.height());
    let sa = a.samples();
    let sb = b.samples();

    let sq_a: Vec<f64> = sa.iter().map(|v| v * v).collect();
    let sq_b: Vec<f64> = sb.iter().map(|v| v * v).collect();
    let cross: Vec<f64> = sa.iter().zip(sb).map(|(x, y)| x * y).collect();

    let mu_a = filter_valid(sa, w, h, weights);
    let mu_b = filter_valid(sb, w, h, weights);
    let e_aa = filter_valid(&sq_a, w, h, weights);
    let e_bb = filter_valid(&sq_b, w, h, weights);
    let e_ab = filter_valid(&cross, w, h, weights);

    let total: f64 = (0..mu_a.len())
        .map(|i| {
            let (ma, mb) = (mu_a[i], mu_b[i]);
            local_ssim(
                ma,
                mb,
                ma.mul_add(-ma, e_aa[i]),
                mb.mul_add(-mb, e_bb[i]),
                ma.mul_add(-mb, e_ab[i]),
            )
        })
        .sum();

    total / mu_a.len() as f64
}

/// Separable weighted filter keeping only positions where the window
/// lies fully inside the grid. Output is `(w - k + 1) × (h - k + 1)`,
/// row-major.
fn filter_valid(src: &[f64], width: usize, height: usize, weights: &[f64]) -> Vec<f64> {
    let k = weights.len();
    let out_w = width + 1 - k;
    let out_h = height + 1 - k;

    let mut horizontal = Vec::with_capacity(out_w * height);
    for row in src.chunks_exact(width) {
        for x in 0..out_w {
            horizontal.push(dot(&row[x..x + k], weights));
        }
    }

    let mut out = Vec::with_capacity(out_w * out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let acc = weights
                .iter()
                .enumerate()
                .fold(0.0, |acc, (i, wt)| {
                    wt.mul_add(horizontal[(y + i) * out_w + x], acc)
                });
            out.push(acc);
        }
    }
    out
}

fn dot(values: &[f64], weights: &[f64]) -> f64 {
    values
        .iter()
        .zip(weights)
        .fold(0.0, |acc, (v, w)| v.mul_add(*w, acc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn grid_from_fn(w: usize, h: usize, f: impl Fn(usize, usize) -> f64) -> LumaGrid {
        let data = (0..h).flat_map(|y| (0..w).map(move |x| (x, y))).map(|(x, y)| f(x, y)).collect();
        LumaGrid::new(w, h, data).unwrap()
    }

    #[allow(clippy::cast_precision_loss)]
    fn ramp(w: usize, h: usize) -> LumaGrid {
        grid_from_fn(w, h, |x, y| ((x * 7 + y * 13) % 256) as f64)
    }

    fn checker(w: usize, h: usize, invert: bool) -> LumaGrid {
        grid_from_fn(w, h, |x, y| {
            if ((x + y) % 2 == 0) ^ invert {
                255.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn constants_match_the_standard_values() {
        assert!((C1 - 6.5025).abs() < 1e-12);
        assert!((C2 - 58.5225).abs() < 1e-12);
    }

    #[test]
    fn weights_sum_to_one() {
        for window in [
            SsimWindow::default(),
            SsimWindow::Uniform { size: 8 },
            SsimWindow::Gaussian {
                size: 7,
                sigma: 0.8,
            },
        ] {
            let sum: f64 = window.weights().iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "{window:?} sums to {sum}");
        }
    }

    #[test]
    fn gaussian_weights_peak_in_the_middle() {
        let w = SsimWindow::default().weights();
        assert_eq!(w.len(), 11);
        assert!(w[5] > w[4] && w[4] > w[0]);
        assert!((w[0] - w[10]).abs() < 1e-15);
    }

    #[test]
    fn identical_grids_score_one() {
        let g = ramp(40, 30);
        for window in [SsimWindow::default(), SsimWindow::Uniform { size: 8 }] {
            let s = ssim(&g, &g, window).unwrap();
            assert!((s - 1.0).abs() < 1e-12, "{window:?}: {s}");
        }
    }

    #[test]
    fn identical_uniform_grids_score_one() {
        let g = LumaGrid::filled(20, 20, 128.0);
        assert!((ssim(&g, &g, SsimWindow::default()).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn black_versus_white_matches_closed_form() {
        let black = LumaGrid::filled(20, 20, 0.0);
        let white = LumaGrid::filled(20, 20, 255.0);
        let expected = C1 / (255.0 * 255.0 + C1);
        let s = ssim(&black, &white, SsimWindow::default()).unwrap();
        assert!((s - expected).abs() < 1e-9, "got {s}, expected {expected}");
    }

    #[test]
    fn small_image_falls_back_to_global_statistics() {
        let black = LumaGrid::filled(4, 3, 0.0);
        let white = LumaGrid::filled(4, 3, 255.0);
        let expected = C1 / (255.0 * 255.0 + C1);
        let s = ssim(&black, &white, SsimWindow::default()).unwrap();
        assert!((s - expected).abs() < 1e-9);

        let g = ramp(5, 5);
        assert!((ssim(&g, &g, SsimWindow::default()).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_structure_is_negative() {
        let a = checker(16, 16, false);
        let b = checker(16, 16, true);
        let s = ssim(&a, &b, SsimWindow::Uniform { size: 8 }).unwrap();
        assert!(s < -0.99, "got {s}");
        assert!(s >= -1.0);
    }

    #[test]
    fn symmetric() {
        let a = ramp(24, 24);
        let b = checker(24, 24, false);
        let ab = ssim(&a, &b, SsimWindow::default()).unwrap();
        let ba = ssim(&b, &a, SsimWindow::default()).unwrap();
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn brighter_offsets_lower_similarity() {
        let a = ramp(32, 32);
        let mut last = 1.0;
        for offset in [0.0, 10.0, 40.0, 90.0, 160.0] {
            let b = grid_from_fn(32, 32, |x, y| {
                let i = y * 32 + x;
                (a.samples()[i] + offset).min(255.0)
            });
            let s = ssim(&a, &b, SsimWindow::default()).unwrap();
            assert!(s <= last + 1e-12, "offset {offset}: {s} > {last}");
            last = s;
        }
    }

    #[test]
    fn mismatched_shapes_are_internal_errors() {
        let a = LumaGrid::filled(3, 3, 0.0);
        let b = LumaGrid::filled(4, 3, 0.0);
        assert!(matches!(
            ssim(&a, &b, SsimWindow::default()),
            Err(AnalysisError::Internal(_))
        ));
    }

    #[test]
    fn invalid_windows_rejected() {
        assert!(SsimWindow::Uniform { size: 0 }.validate().is_err());
        assert!(
            SsimWindow::Gaussian {
                size: 11,
                sigma: 0.0
            }
            .validate()
            .is_err()
        );
        assert!(
            SsimWindow::Gaussian {
                size: 11,
                sigma: f64::NAN
            }
            .validate()
            .is_err()
        );
        assert!(SsimWindow::Uniform { size: 65 }.validate().is_err());
        assert!(SsimWindow::default().validate().is_ok());
    }

    #[test]
    fn window_serde_is_tagged() {
        let json = serde_json::to_string(&SsimWindow::Uniform { size: 8 }).unwrap();
        assert_eq!(json, r#"{"kind":"uniform","size":8}"#);
    }
}

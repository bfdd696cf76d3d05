//! Luminance histogram comparison by Pearson correlation.
//!
//! Each grid is reduced to a histogram of `bins` equal-width bins over
//! the 8-bit range, and the two histograms are compared with the same
//! correlation formula OpenCV uses for `HISTCMP_CORREL`:
//!
//! ```text
//!            Σ (h1ᵢ - h̄1)(h2ᵢ - h̄2)
//! d = ─────────────────────────────────────
//!     √( Σ (h1ᵢ - h̄1)² · Σ (h2ᵢ - h̄2)² )
//! ```
//!
//! Samples are not rounded. Each one is split linearly between the two
//! bins whose centers surround it, so a small brightness shift moves a
//! small amount of mass instead of whole bins.
//!
//! Identical histograms score exactly 1. When either histogram is flat
//! (zero variance) and they differ, the correlation is undefined and
//! reported as 0.

use super::luma::LumaGrid;

/// Luminance histogram with `bins` bins (clamped to `1..=256`).
///
/// Bin `i` is centered on level `(i + 0.5) * 256 / bins`. A sample
/// between two centers contributes to both in proportion to its
/// distance from each; below the first or above the last center it
/// lands entirely in the edge bin. Every sample adds exactly 1 in total.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn luminance_histogram(grid: &LumaGrid, bins: usize) -> Vec<f64> {
    let bins = bins.clamp(1, 256);
    let last = bins - 1;
    let scale = bins as f64 / 256.0;
    let index = |position: f64| (position.max(0.0) as usize).min(last);

    let mut counts = vec![0.0; bins];
    for &sample in grid.samples() {
        let position = sample.clamp(0.0, 255.0).mul_add(scale, -0.5);
        let lower = position.floor();
        let upper_share = position - lower;
        counts[index(lower)] += 1.0 - upper_share;
        counts[index(lower + 1.0)] += upper_share;
    }
    counts
}

/// Pearson correlation of two histograms of equal length, in `[-1, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn correlation(h1: &[f64], h2: &[f64]) -> f64 {
    debug_assert_eq!(h1.len(), h2.len(), "histogram lengths differ");
    if h1 == h2 {
        return 1.0;
    }
    if h1.is_empty() || h1.len() != h2.len() {
        return 0.0;
    }

    let n = h1.len() as f64;
    let mean1 = h1.iter().sum::<f64>() / n;
    let mean2 = h2.iter().sum::<f64>() / n;

    let (mut num, mut var1, mut var2) = (0.0, 0.0, 0.0);
    for (&a, &b) in h1.iter().zip(h2) {
        let d1 = a - mean1;
        let d2 = b - mean2;
        num += d1 * d2;
        var1 += d1 * d1;
        var2 += d2 * d2;
    }

    let denom = (var1 * var2).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (num / denom).clamp(-1.0, 1.0)
}

/// Correlation between the luminance histograms of two grids.
#[must_use]
pub fn histogram_correlation(a: &LumaGrid, b: &LumaGrid, bins: usize) -> f64 {
    correlation(&luminance_histogram(a, bins), &luminance_histogram(b, bins))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn gradient(len: usize) -> LumaGrid {
        let data = (0..len).map(|i| (i % 256) as f64).collect();
        LumaGrid::new(len, 1, data).unwrap_or_else(|| LumaGrid::filled(1, 1, 0.0))
    }

    #[test]
    fn histogram_counts_every_sample() {
        let grid = LumaGrid::filled(10, 10, 42.0);
        let h = luminance_histogram(&grid, 32);
        assert_eq!(h.len(), 32);
        // 42 sits a quarter of the way from the center of bin 5 to bin 4.
        assert!((h[4] - 25.0).abs() < 1e-9);
        assert!((h[5] - 75.0).abs() < 1e-9);
        assert!((h.iter().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn level_on_a_bin_center_fills_one_bin() {
        let h = luminance_histogram(&LumaGrid::filled(4, 4, 12.0), 32);
        assert!((h[1] - 16.0).abs() < 1e-9);
        assert!(h.iter().enumerate().all(|(i, &c)| i == 1 || c.abs() < 1e-9));
    }

    #[test]
    fn edge_levels_stay_in_edge_bins() {
        let black = luminance_histogram(&LumaGrid::filled(2, 2, 0.0), 32);
        let white = luminance_histogram(&LumaGrid::filled(2, 2, 255.0), 32);
        assert!((black[0] - 4.0).abs() < 1e-9);
        assert!((white[31] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn coarse_bins_merge_levels() {
        let h = luminance_histogram(&gradient(256), 4);
        let expected = [64.5, 64.0, 64.0, 63.5];
        for (got, want) in h.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{h:?}");
        }
    }

    #[test]
    fn one_level_shift_keeps_most_of_the_correlation() {
        let a = LumaGrid::filled(10, 10, 100.0);
        let b = LumaGrid::filled(10, 10, 101.0);
        let c = histogram_correlation(&a, &b, 32);
        assert!(c > 0.95 && c < 1.0, "got {c}");
    }

    #[test]
    fn brightening_never_raises_correlation() {
        // Ten samples of every level from 0 to 150.
        let levels: Vec<f64> = (0..1510).map(|i| f64::from(i % 151)).collect();
        let before = LumaGrid::new(1510, 1, levels.clone()).unwrap();
        let mut last = 1.0;
        for offset in 0..=40 {
            let shifted = levels.iter().map(|v| v + f64::from(offset)).collect();
            let after = LumaGrid::new(1510, 1, shifted).unwrap();
            let c = histogram_correlation(&before, &after, 32);
            assert!(c <= last + 1e-12, "offset {offset}: {c} > {last}");
            last = c;
        }
        assert!(last < 0.5, "final {last}");
    }

    #[test]
    fn identical_uniform_images_correlate_perfectly() {
        let g = LumaGrid::filled(100, 100, 128.0);
        assert!((histogram_correlation(&g, &g, 256) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn identical_flat_histograms_still_correlate_perfectly() {
        // A single bin has zero variance.
        let g = gradient(256);
        assert!((histogram_correlation(&g, &g, 1) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flat_versus_peaked_is_zero() {
        let flat = [5.0; 4];
        let peaked = [1.0, 2.0, 3.0, 4.0];
        assert!(correlation(&flat, &peaked).abs() < f64::EPSILON);
        assert!(correlation(&peaked, &flat).abs() < f64::EPSILON);
    }

    #[test]
    fn black_versus_white_is_slightly_negative() {
        let black = LumaGrid::filled(100, 100, 0.0);
        let white = LumaGrid::filled(100, 100, 255.0);
        let c = histogram_correlation(&black, &white, 32);
        assert!((c - (-1.0 / 31.0)).abs() < 1e-12, "got {c}");
    }

    #[test]
    fn symmetric() {
        let a = gradient(300);
        let b = LumaGrid::filled(300, 1, 200.0);
        let ab = histogram_correlation(&a, &b, 64);
        let ba = histogram_correlation(&b, &a, 64);
        assert!((ab - ba).abs() < f64::EPSILON);
    }

    #[test]
    fn stays_in_range() {
        let a = gradient(1000);
        let b = LumaGrid::filled(1000, 1, 3.0);
        for bins in [2, 16, 256] {
            let c = histogram_correlation(&a, &b, bins);
            assert!((-1.0..=1.0).contains(&c), "bins={bins}: {c}");
        }
    }
}

//! The metric suite: three independent comparators over a raster pair.
//!
//! Each comparator is a pure, total function of the two rasters. The
//! suite runs them on the rayon pool; running them one after another
//! gives bit-identical values.

pub mod histogram;
pub mod luma;
pub mod mse;
pub mod ssim;

pub use luma::LumaGrid;

use crate::normalize::RasterPair;
use crate::types::{AnalysisConfig, AnalysisError, MetricSet};

/// Compute MSE, SSIM and histogram correlation for a pair.
///
/// # Errors
///
/// Returns [`AnalysisError::Internal`] if a comparator produces a
/// non-finite value, which valid rasters cannot cause.
pub fn compute_metrics(
    pair: &RasterPair,
    config: &AnalysisConfig,
) -> Result<MetricSet, AnalysisError> {
    let (mse, (ssim, histogram_correlation)) = rayon::join(
        || mse::mean_squared_error(pair.before(), pair.after()),
        || {
            // SSIM and the histograms both work on luminance.
            let before = LumaGrid::from_rgb(pair.before());
            let after = LumaGrid::from_rgb(pair.after());
            rayon::join(
                || ssim::ssim(&before, &after, config.ssim_window),
                || histogram::histogram_correlation(&before, &after, config.histogram_bins),
            )
        },
    );

    let metrics = MetricSet {
        mse,
        ssim: ssim?,
        histogram_correlation,
    };
    check_finite(&metrics)?;

    tracing::debug!(
        mse = metrics.mse,
        ssim = metrics.ssim,
        histogram_correlation = metrics.histogram_correlation,
        "computed metrics",
    );
    Ok(metrics)
}

fn check_finite(metrics: &MetricSet) -> Result<(), AnalysisError> {
    let fields = [
        ("mse", metrics.mse),
        ("ssim", metrics.ssim),
        ("histogram_correlation", metrics.histogram_correlation),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(AnalysisError::Internal(format!(
                "{name} is not finite ({value})"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{solid, textured};

    #[test]
    fn identical_pair_is_perfect() {
        let pair = RasterPair::new(textured(48, 40), textured(48, 40)).unwrap();
        let m = compute_metrics(&pair, &AnalysisConfig::default()).unwrap();
        assert!(m.mse.abs() < 1e-12);
        assert!((m.ssim - 1.0).abs() < 1e-9);
        assert!((m.histogram_correlation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn black_versus_white() {
        let pair = RasterPair::new(solid(100, 100, 0), solid(100, 100, 255)).unwrap();
        let m = compute_metrics(&pair, &AnalysisConfig::default()).unwrap();
        assert!((m.mse - 65_025.0).abs() < 1e-9);
        assert!(m.ssim < 0.01);
        assert!(m.histogram_correlation < 0.01);
    }

    #[test]
    fn non_finite_metrics_are_internal_errors() {
        let m = MetricSet {
            mse: f64::NAN,
            ssim: 1.0,
            histogram_correlation: 1.0,
        };
        assert!(matches!(check_finite(&m), Err(AnalysisError::Internal(_))));
    }
}

//! ruinscope-core: Pure before/after image comparison engine (sans-IO).
//!
//! Compares a "before" and an "after" photograph of the same scene and
//! produces:
//!
//! - three comparators (MSE, SSIM, luminance histogram correlation),
//! - a composite damage score in `[0, 1]` with an intensity level,
//! - a PNG heatmap of where the change happened.
//!
//! This crate has **no I/O dependencies**. It takes in-memory byte
//! slices and returns structured data; reading files and serializing
//! responses live in `ruinscope-report` and the `ruinscope` CLI.

pub mod decode;
pub mod diagnostics;
pub mod metrics;
pub mod normalize;
pub mod score;
pub mod types;
pub mod visualize;

#[cfg(test)]
mod testing;

use std::hash::Hasher;

pub use metrics::ssim::SsimWindow;
pub use normalize::{NormalizationReport, RasterPair, ResampleFilter};
pub use score::{BadnessWeights, IntensityThresholds, ScoreBreakdown, ScoringConfig};
pub use types::{
    AnalysisConfig, AnalysisError, AnalysisResult, DamageAssessment, Dimensions, ErrorKind,
    ImageRole, IntensityLevel, MetricSet, RgbImage, VisualizationArtifact,
};
pub use visualize::{VisualizationConfig, VisualizationLayout};

/// Analyze a before/after pair of encoded images.
///
/// Accepts PNG, JPEG, BMP, WebP and TIFF. Inputs of different sizes are
/// brought to a common shape before comparison.
///
/// # Steps
///
/// 1. Validate the configuration
/// 2. Decode both inputs to 8-bit RGB
/// 3. Normalize to a common shape
/// 4. Compute metrics and render the heatmap (in parallel)
/// 5. Score and classify
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] for a bad configuration,
/// [`AnalysisError::EmptyInput`] or [`AnalysisError::Decode`] for
/// undecodable input, [`AnalysisError::Shape`] for a zero-area image,
/// and [`AnalysisError::Encode`] or [`AnalysisError::Internal`] for
/// engine faults. No partial result is ever returned.
#[tracing::instrument(skip_all, fields(before_bytes = before_bytes.len(), after_bytes = after_bytes.len()))]
pub fn analyze(
    before_bytes: &[u8],
    after_bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    config.validate()?;

    let before = decode::decode_raster(before_bytes, ImageRole::Before)?;
    let after = decode::decode_raster(after_bytes, ImageRole::After)?;
    let (pair, normalization) = normalize::normalize_pair(before, after, config)?;

    compose(pair, normalization, config)
}

/// Analyze two already-decoded rasters of the same shape.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] for a bad configuration and
/// the same engine faults as [`analyze`].
pub fn analyze_rasters(
    pair: RasterPair,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    config.validate()?;
    let dimensions = pair.dimensions();
    let normalization = NormalizationReport {
        before_source: dimensions,
        after_source: dimensions,
        target: dimensions,
        before_resampled: false,
        after_resampled: false,
    };
    compose(pair, normalization, config)
}

fn compose(
    pair: RasterPair,
    normalization: NormalizationReport,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let (metrics, visualization) = rayon::join(
        || metrics::compute_metrics(&pair, config),
        || visualize::visualize(&pair, &config.visualization),
    );
    let metrics = metrics?;
    let visualization = visualization?;

    let assessment = score::assess(&metrics, &config.scoring);
    let breakdown = ScoreBreakdown::from_metrics(&metrics, &config.scoring);

    tracing::info!(
        dimensions = %pair.dimensions(),
        damage_score = assessment.damage_score,
        intensity_level = %assessment.intensity_level,
        "analysis complete",
    );

    Ok(AnalysisResult {
        metrics,
        assessment,
        breakdown,
        visualization,
        dimensions: pair.dimensions(),
        normalization,
    })
}

/// Content key for a before/after pair.
///
/// SipHash-1-3 with fixed keys over both buffers, each prefixed with
/// its length, so `(a, b)` and `(b, a)` hash differently and no split of
/// one concatenation collides with another. Stable across runs and
/// platforms.
#[must_use]
pub fn fingerprint(before_bytes: &[u8], after_bytes: &[u8]) -> u64 {
    let mut hasher = siphasher::sip::SipHasher13::new();
    for bytes in [before_bytes, after_bytes] {
        hasher.write_u64(bytes.len() as u64);
        hasher.write(bytes);
    }
    hasher.finish()
}

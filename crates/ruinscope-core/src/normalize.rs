//! Shape normalization: bring two rasters to one common size.
//!
//! The comparison target is `(min(w_before, w_after), min(h_before,
//! h_after))`. Any raster not already at the target is resampled to
//! exactly that size with the configured [`ResampleFilter`]; no raster
//! is ever upsampled along an axis where it was the smaller one.
//!
//! An optional working-resolution cap runs first, shrinking each input
//! so its longest axis fits, with aspect ratio preserved.
//!
//! [`RasterPair`] is the only way the rest of the engine receives two
//! rasters, and its constructor rejects pairs of unequal shape.

use std::fmt;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::types::{AnalysisConfig, AnalysisError, Dimensions, RgbImage};

/// Resampling filter used when an input must change size.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Two rasters guaranteed to share width, height and channel layout.
#[derive(Debug, Clone)]
pub struct RasterPair {
    before: RgbImage,
    after: RgbImage,
}

impl RasterPair {
    /// Pair two rasters of identical, non-empty shape.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Internal`] if the shapes differ or are
    /// empty. Decoded inputs go through [`normalize_pair`], which never
    /// produces such a pair.
    pub fn new(before: RgbImage, after: RgbImage) -> Result<Self, AnalysisError> {
        if before.dimensions() != after.dimensions() {
            return Err(AnalysisError::Internal(format!(
                "raster shapes differ: {} vs {}",
                Dimensions::of(&before),
                Dimensions::of(&after),
            )));
        }
        if Dimensions::of(&before).is_empty() {
            return Err(AnalysisError::Internal(
                "raster pair has zero area".to_string(),
            ));
        }
        Ok(Self { before, after })
    }

    /// The "before" raster.
    #[must_use]
    pub const fn before(&self) -> &RgbImage {
        &self.before
    }

    /// The "after" raster.
    #[must_use]
    pub const fn after(&self) -> &RgbImage {
        &self.after
    }

    /// Shared shape of both rasters.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.before)
    }

    /// The same pair with the roles exchanged.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            before: self.after,
            after: self.before,
        }
    }
}

/// What [`normalize_pair`] did to each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// Decoded size of the "before" input.
    pub before_source: Dimensions,
    /// Decoded size of the "after" input.
    pub after_source: Dimensions,
    /// Shape both rasters were compared at.
    pub target: Dimensions,
    /// Whether the "before" raster was resampled.
    pub before_resampled: bool,
    /// Whether the "after" raster was resampled.
    pub after_resampled: bool,
}

/// Longest-axis cap with aspect ratio preserved. Each axis stays at
/// least one pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn capped_dimensions(dimensions: Dimensions, max_dimension: u32) -> Dimensions {
    let long_axis = dimensions.width.max(dimensions.height);
    if long_axis <= max_dimension {
        return dimensions;
    }

    let scale = f64::from(max_dimension) / f64::from(long_axis);
    let scaled = |v: u32| ((f64::from(v) * scale).round() as u32).clamp(1, max_dimension);
    Dimensions {
        width: scaled(dimensions.width),
        height: scaled(dimensions.height),
    }
}

/// Common comparison shape for two inputs.
#[must_use]
pub fn target_dimensions(before: Dimensions, after: Dimensions) -> Dimensions {
    Dimensions {
        width: before.width.min(after.width),
        height: before.height.min(after.height),
    }
}

/// Resample `image` to exactly `target`, or return it untouched when it
/// already has that shape.
fn fit(image: RgbImage, target: Dimensions, filter: ResampleFilter) -> (RgbImage, bool) {
    if Dimensions::of(&image) == target {
        return (image, false);
    }
    let resized = imageops::resize(
        &image,
        target.width,
        target.height,
        filter.to_image_filter(),
    );
    (resized, true)
}

/// Bring two decoded rasters to a common shape.
///
/// # Errors
///
/// Returns [`AnalysisError::Internal`] only if resampling yields
/// mismatched buffers, which indicates a defect.
pub fn normalize_pair(
    before: RgbImage,
    after: RgbImage,
    config: &AnalysisConfig,
) -> Result<(RasterPair, NormalizationReport), AnalysisError> {
    let before_source = Dimensions::of(&before);
    let after_source = Dimensions::of(&after);

    let (before_capped, after_capped) = match config.working_resolution {
        Some(max) => (
            capped_dimensions(before_source, max),
            capped_dimensions(after_source, max),
        ),
        None => (before_source, after_source),
    };

    // Each input is resampled at most once, straight to the final target.
    let target = target_dimensions(before_capped, after_capped);
    let (before, before_resampled) = fit(before, target, config.resample_filter);
    let (after, after_resampled) = fit(after, target, config.resample_filter);

    tracing::debug!(
        %before_source,
        %after_source,
        %target,
        before_resampled,
        after_resampled,
        filter = %config.resample_filter,
        "normalized raster pair",
    );

    let pair = RasterPair::new(before, after)?;
    Ok((
        pair,
        NormalizationReport {
            before_source,
            after_source,
            target,
            before_resampled,
            after_resampled,
        },
    ))
}

//! Shared types for the ruinscope comparison engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::ssim::SsimWindow;
use crate::normalize::{NormalizationReport, ResampleFilter};
use crate::score::{ScoreBreakdown, ScoringConfig};
use crate::visualize::VisualizationConfig;

/// Re-export `RgbImage` so downstream crates can hold canonical rasters
/// without depending on `image` directly.
///
/// Every raster inside the engine is 8-bit RGB: alpha is dropped and
/// other bit depths are reduced to 8 bits during decoding.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an `image` crate buffer.
    #[must_use]
    pub fn of(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which of the two inputs a value or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRole {
    /// The photograph taken before the event.
    Before,
    /// The photograph taken after the event.
    After,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// The three comparators computed for one before/after pair.
///
/// MSE is reported on the `[0, 255]` sample scale, so its range is
/// `[0, 65025]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Mean squared per-sample difference across all channels.
    pub mse: f64,
    /// Mean structural similarity over all window positions, in `[-1, 1]`.
    pub ssim: f64,
    /// Pearson correlation of the two luminance histograms, in `[-1, 1]`.
    pub histogram_correlation: f64,
}

/// Discrete damage bucket derived from the damage score.
///
/// Ordered from least to most severe. Serialized as the bare variant
/// name, which is the value the client contract expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntensityLevel {
    /// No visible change.
    None,
    /// Small, localized change.
    Minor,
    /// Clear change over part of the scene.
    Moderate,
    /// Most of the scene changed.
    Severe,
    /// The scene is essentially unrecognizable.
    Catastrophic,
}

impl IntensityLevel {
    /// All levels in ascending severity.
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::Minor,
        Self::Moderate,
        Self::Severe,
        Self::Catastrophic,
    ];

    /// Contract value, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::Catastrophic => "Catastrophic",
        }
    }

    /// Human-facing text such as `"Severe damage"`.
    ///
    /// Display only; the contract value is [`Self::as_str`].
    #[must_use]
    pub const fn display_label(self) -> &'static str {
        match self {
            Self::None => "No damage",
            Self::Minor => "Minor damage",
            Self::Moderate => "Moderate damage",
            Self::Severe => "Severe damage",
            Self::Catastrophic => "Catastrophic damage",
        }
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite damage score and its intensity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageAssessment {
    /// Weighted badness in `[0, 1]`.
    pub damage_score: f64,
    /// Bucket the score falls into.
    pub intensity_level: IntensityLevel,
}

/// Media type of every artifact the visualizer produces.
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// Encoded difference visualization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualizationArtifact {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// Media type of `bytes`, e.g. `image/png`.
    pub media_type: &'static str,
    /// Pixel size of the encoded image (wider than the inputs for the
    /// side-by-side layout).
    pub dimensions: Dimensions,
}

impl VisualizationArtifact {
    /// File extension matching [`Self::media_type`].
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.media_type {
            PNG_MEDIA_TYPE => "png",
            _ => "bin",
        }
    }
}

/// Everything produced for one before/after pair.
///
/// Constructed once per request and never mutated.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Raw comparators.
    pub metrics: MetricSet,
    /// Composite score and intensity level.
    pub assessment: DamageAssessment,
    /// Per-metric badness terms behind the score.
    pub breakdown: ScoreBreakdown,
    /// Encoded heatmap.
    pub visualization: VisualizationArtifact,
    /// Shape both rasters were compared at.
    pub dimensions: Dimensions,
    /// What the normalizer did to reach `dimensions`.
    pub normalization: NormalizationReport,
}

/// Configuration for the comparison engine.
///
/// Every calibration parameter lives here with a documented default.
/// Missing fields deserialize to their defaults, so a partial JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Longest-axis cap applied to each input before shape matching.
    /// `None` compares at native resolution.
    pub working_resolution: Option<u32>,

    /// Resampling filter used for both the cap and shape matching.
    pub resample_filter: ResampleFilter,

    /// Window used by SSIM.
    pub ssim_window: SsimWindow,

    /// Number of luminance histogram bins (2 to 256).
    pub histogram_bins: usize,

    /// Badness weights, MSE reference and intensity thresholds.
    pub scoring: ScoringConfig,

    /// Heatmap rendering options.
    pub visualization: VisualizationConfig,
}

impl AnalysisConfig {
    /// Default histogram bin count: eight 8-bit levels per bin.
    pub const DEFAULT_HISTOGRAM_BINS: usize = 32;

    /// Smallest accepted histogram bin count.
    pub const MIN_HISTOGRAM_BINS: usize = 2;

    /// Largest accepted histogram bin count.
    pub const MAX_HISTOGRAM_BINS: usize = 256;

    /// Check every parameter, returning the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] describing the offending
    /// field.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.working_resolution == Some(0) {
            return Err(AnalysisError::InvalidConfig(
                "working_resolution must be at least 1".to_string(),
            ));
        }
        if !(Self::MIN_HISTOGRAM_BINS..=Self::MAX_HISTOGRAM_BINS).contains(&self.histogram_bins) {
            return Err(AnalysisError::InvalidConfig(format!(
                "histogram_bins must be in {}..={}, got {}",
                Self::MIN_HISTOGRAM_BINS,
                Self::MAX_HISTOGRAM_BINS,
                self.histogram_bins,
            )));
        }
        self.ssim_window.validate()?;
        self.scoring.validate()?;
        self.visualization.validate()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            working_resolution: None,
            resample_filter: ResampleFilter::default(),
            ssim_window: SsimWindow::default(),
            histogram_bins: Self::DEFAULT_HISTOGRAM_BINS,
            scoring: ScoringConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

/// Coarse error category exposed to callers.
///
/// Lets a boundary tell "bad input" apart from "system fault" without
/// inspecting error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Input bytes are not a decodable image.
    Decode,
    /// Decoded image has an unusable shape.
    Shape,
    /// Defect or misconfiguration inside the engine.
    Internal,
}

impl ErrorKind {
    /// `true` for categories caused by the submitted images.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::Decode | Self::Shape)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => f.write_str("decode"),
            Self::Shape => f.write_str("shape"),
            Self::Internal => f.write_str("internal"),
        }
    }
}

/// Errors that can occur while analyzing a pair.
///
/// Every failure is fatal to the request; the engine never returns a
/// partial result.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The input buffer was empty.
    #[error("{role} image data is empty")]
    EmptyInput { role: ImageRole },

    /// The input buffer could not be decoded.
    #[error("failed to decode {role} image: {source}")]
    Decode {
        role: ImageRole,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image has zero area.
    #[error("{role} image has unusable dimensions {width}x{height}")]
    Shape {
        role: ImageRole,
        width: u32,
        height: u32,
    },

    /// Engine configuration is invalid.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// Encoding the visualization failed.
    #[error("failed to encode visualization: {0}")]
    Encode(#[source] image::ImageError),

    /// A numeric step hit a state that valid rasters cannot produce.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput { .. } | Self::Decode { .. } => ErrorKind::Decode,
            Self::Shape { .. } => ErrorKind::Shape,
            Self::InvalidConfig(_) | Self::Encode(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Input the error refers to, when it refers to one.
    #[must_use]
    pub const fn role(&self) -> Option<ImageRole> {
        match self {
            Self::EmptyInput { role } | Self::Decode { role, .. } | Self::Shape { role, .. } => {
                Some(*role)
            }
            Self::InvalidConfig(_) | Self::Encode(_) | Self::Internal(_) => None,
        }
    }
}

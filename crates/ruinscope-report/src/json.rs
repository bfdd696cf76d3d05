//! Response JSON for the analysis contract.
//!
//! ```json
//! {
//!   "analysis": {
//!     "damage_score": 0.42,
//!     "intensity_level": "Moderate",
//!     "metrics": { "mse": 812.5, "ssim": 0.61, "histogram_correlation": 0.88 }
//!   },
//!   "visualization": "data:image/png;base64,..."
//! }
//! ```
//!
//! Failures are reported as `{"error": "...", "kind": "decode"}`.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::{Deserialize, Serialize};

use ruinscope_core::{
    AnalysisError, AnalysisResult, ErrorKind, IntensityLevel, MetricSet, VisualizationArtifact,
};

/// Message returned in place of internal error details.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error while analyzing images";

/// The `analysis` object of a response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Combined badness in `[0, 1]`.
    pub damage_score: f64,
    /// Bucket of `damage_score`.
    pub intensity_level: IntensityLevel,
    /// The raw comparator values.
    pub metrics: MetricSet,
}

impl From<&AnalysisResult> for AnalysisReport {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            damage_score: result.assessment.damage_score,
            intensity_level: result.assessment.intensity_level,
            metrics: result.metrics,
        }
    }
}

/// How the response refers to the visualization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualizationRef {
    /// Embed the artifact as a `data:` URL.
    Inline,
    /// Point at a location the caller stored the artifact at.
    Url(String),
}

impl VisualizationRef {
    /// The string placed in the response's `visualization` field.
    #[must_use]
    pub fn resolve(&self, artifact: &VisualizationArtifact) -> String {
        match self {
            Self::Inline => data_url(artifact),
            Self::Url(url) => url.clone(),
        }
    }
}

/// `data:<media type>;base64,<bytes>` for an artifact.
#[must_use]
pub fn data_url(artifact: &VisualizationArtifact) -> String {
    format!(
        "data:{};base64,{}",
        artifact.media_type,
        B64.encode(&artifact.bytes)
    )
}

/// Successful response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Score, level and metrics.
    pub analysis: AnalysisReport,
    /// Data URL or caller-supplied location of the heatmap.
    pub visualization: String,
}

impl AnalysisResponse {
    /// Build the body for `result`, referring to its heatmap as `visualization` says.
    #[must_use]
    pub fn new(result: &AnalysisResult, visualization: &VisualizationRef) -> Self {
        Self {
            analysis: AnalysisReport::from(result),
            visualization: visualization.resolve(&result.visualization),
        }
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Message safe to show to the client.
    pub error: String,
    /// Failure category.
    pub kind: ErrorKind,
}

impl ErrorResponse {
    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl From<&AnalysisError> for ErrorResponse {
    /// Client errors carry their message. Internal errors get a fixed
    /// message so engine details do not leak.
    fn from(err: &AnalysisError) -> Self {
        let kind = err.kind();
        let error = if kind.is_client_error() {
            err.to_string()
        } else {
            INTERNAL_ERROR_MESSAGE.to_string()
        };
        Self { error, kind }
    }
}
